//! Engine binary lookup.

use std::path::{Path, PathBuf};

use greensub_common::error::{GreensubError, GreensubResult};

/// Resolve an engine binary to an executable file.
///
/// A bare name is searched on `PATH`; anything with a directory component
/// is checked as given. Nothing is spawned.
pub fn locate_program(program: &Path) -> GreensubResult<PathBuf> {
    if program.as_os_str().is_empty() {
        return Err(GreensubError::configuration("engine path is empty"));
    }

    if program.components().count() > 1 || program.is_absolute() {
        return if is_executable(program) {
            Ok(program.to_path_buf())
        } else if program.exists() {
            Err(GreensubError::configuration(format!(
                "{} is not an executable file",
                program.display()
            )))
        } else {
            Err(GreensubError::configuration(format!(
                "{} does not exist",
                program.display()
            )))
        };
    }

    let search = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| {
            GreensubError::configuration(format!(
                "{} not found in PATH",
                program.display()
            ))
        })
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &Path) -> Vec<PathBuf> {
    let plain = dir.join(program);
    let mut exe = plain.clone().into_os_string();
    exe.push(".exe");
    vec![plain, PathBuf::from(exe)]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &Path) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
