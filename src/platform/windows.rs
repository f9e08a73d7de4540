use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use winapi::um::fileapi::GetDiskFreeSpaceExW;
use winapi::um::winnt::ULARGE_INTEGER;

pub fn free_space(path: &Path) -> io::Result<u64> {
    let path_wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let mut available: ULARGE_INTEGER = std::mem::zeroed();
        if GetDiskFreeSpaceExW(
            path_wide.as_ptr(),
            &mut available,
            ptr::null_mut(),
            ptr::null_mut(),
        ) == 0
        {
            return Err(io::Error::last_os_error());
        }
        Ok(*available.QuadPart())
    }
}
