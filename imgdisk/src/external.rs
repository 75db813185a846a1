// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thin, mockable wrappers around the external tools the disk assembler
//! shells out to: `kpartx`, `mkfs`, `mount`, `umount`, and `mksquashfs`.
//!
//! Every invocation passes its arguments as an argv vector (no shell
//! interpolation) and clears the inherited environment, per the
//! documented invocation contract. [`CommandRunner`] is the seam tests
//! use to substitute a fake process launcher.

use crate::error::{ExternalToolFailed, ImgDiskError};
use std::path::Path;
use std::process::{Command, ExitStatus, Output};

/// Abstraction over "run a command and collect its output", so callers
/// can substitute a fake without touching the real `kpartx`/`mkfs`/
/// `mount`/`umount` binaries.
pub trait CommandRunner {
    /// Run `cmd` to completion and return its captured output.
    ///
    /// Implementations should not interpret `cmd`'s exit status; that's
    /// handled by the tool-specific wrapper functions below.
    fn run(&self, cmd: Command) -> Result<Output, ImgDiskError>;
}

/// Runs commands for real via [`std::process::Command`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, mut cmd: Command) -> Result<Output, ImgDiskError> {
        log::debug!("running: {cmd:?}");
        cmd.output().map_err(|source| ImgDiskError::Io {
            path: Path::new(cmd.get_program()).to_path_buf(),
            source,
        })
    }
}

fn argv(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

fn run_checked(runner: &dyn CommandRunner, cmd: Command) -> Result<Output, ImgDiskError> {
    let argv = argv(&cmd);
    let output = runner.run(cmd)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(ExternalToolFailed {
            argv,
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status,
        }
        .into())
    }
}

/// `kpartx -avs <image>`. Returns the captured stdout for the caller to
/// parse the `add map` lines out of.
pub fn kpartx_add(runner: &dyn CommandRunner, image: &Path) -> Result<Vec<u8>, ImgDiskError> {
    let mut cmd = Command::new("kpartx");
    cmd.env_clear().arg("-avs").arg(image);
    Ok(run_checked(runner, cmd)?.stdout)
}

/// `kpartx -dvs <image>`.
pub fn kpartx_delete(runner: &dyn CommandRunner, image: &Path) -> Result<(), ImgDiskError> {
    let mut cmd = Command::new("kpartx");
    cmd.env_clear().arg("-dvs").arg(image);
    run_checked(runner, cmd)?;
    Ok(())
}

/// `mkfs -t <fs> <device>`, or `mkfs -t vfat -n EFI_SYSTEM -F 32 <device>`
/// when `fs == "esp"`.
pub fn mkfs(runner: &dyn CommandRunner, fs: &str, device: &Path) -> Result<(), ImgDiskError> {
    let mut cmd = Command::new("mkfs");
    cmd.env_clear();
    if fs == "esp" {
        cmd.args(["-t", "vfat", "-n", "EFI_SYSTEM", "-F", "32"]).arg(device);
    } else {
        cmd.args(["-t", fs]).arg(device);
    }
    run_checked(runner, cmd)?;
    Ok(())
}

/// `mount <device> <mountpoint>`.
pub fn mount(runner: &dyn CommandRunner, device: &Path, target: &Path) -> Result<(), ImgDiskError> {
    let mut cmd = Command::new("mount");
    cmd.env_clear().arg(device).arg(target);
    run_checked(runner, cmd)?;
    Ok(())
}

/// `umount <mountpoint>`.
pub fn umount(runner: &dyn CommandRunner, target: &Path) -> Result<(), ImgDiskError> {
    let mut cmd = Command::new("umount");
    cmd.env_clear().arg(target);
    run_checked(runner, cmd)?;
    Ok(())
}

/// `umount -l <mountpoint>`, tolerating failure. Used only on exception
/// cleanup paths, where the spec calls for logging rather than
/// propagating a second error on top of whatever triggered the cleanup.
pub fn umount_lazy_best_effort(runner: &dyn CommandRunner, target: &Path) {
    let mut cmd = Command::new("umount");
    cmd.env_clear().arg("-l").arg(target);
    match run_checked(runner, cmd) {
        Ok(_) => {}
        Err(e) => log::warn!("cleanup umount -l {} failed: {e}", target.display()),
    }
}

/// `mksquashfs <src> <dst> -comp xz -noappend`.
pub fn mksquashfs(runner: &dyn CommandRunner, src: &Path, dst: &Path) -> Result<(), ImgDiskError> {
    let mut cmd = Command::new("mksquashfs");
    cmd.env_clear().arg(src).arg(dst).args(["-comp", "xz", "-noappend"]);
    run_checked(runner, cmd)?;
    Ok(())
}

/// Exit status helpers shared by tests that build a fake [`Output`]
/// without spawning a real process.
#[cfg(test)]
fn status(code: i32) -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }
    #[cfg(not(unix))]
    {
        let flag = if code == 0 { "exit 0" } else { "exit 1" };
        std::process::Command::new("cmd")
            .args(["/C", flag])
            .status()
            .expect("failed to determine an ExitStatus")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeRunner {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: i32,
        seen: RefCell<Vec<Vec<String>>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, cmd: Command) -> Result<Output, ImgDiskError> {
            self.seen.borrow_mut().push(argv(&cmd));
            Ok(Output {
                status: status(self.exit_code),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
            })
        }
    }

    #[test]
    fn mkfs_esp_uses_vfat_with_efi_label() {
        let runner = FakeRunner {
            stdout: vec![],
            stderr: vec![],
            exit_code: 0,
            seen: RefCell::new(vec![]),
        };
        mkfs(&runner, "esp", Path::new("/dev/mapper/loop0p1")).unwrap();
        let seen = runner.seen.into_inner();
        assert_eq!(
            seen[0],
            vec![
                "mkfs", "-t", "vfat", "-n", "EFI_SYSTEM", "-F", "32",
                "/dev/mapper/loop0p1",
            ]
        );
    }

    #[test]
    fn mkfs_generic_passes_fs_straight_through() {
        let runner = FakeRunner {
            stdout: vec![],
            stderr: vec![],
            exit_code: 0,
            seen: RefCell::new(vec![]),
        };
        mkfs(&runner, "ext4", Path::new("/dev/mapper/loop0p2")).unwrap();
        let seen = runner.seen.into_inner();
        assert_eq!(seen[0], vec!["mkfs", "-t", "ext4", "/dev/mapper/loop0p2"]);
    }

    #[test]
    fn mksquashfs_builds_expected_argv() {
        let runner = FakeRunner {
            stdout: vec![],
            stderr: vec![],
            exit_code: 0,
            seen: RefCell::new(vec![]),
        };
        mksquashfs(&runner, Path::new("/mnt/root"), Path::new("/out/root.sqsh")).unwrap();
        let seen = runner.seen.into_inner();
        assert_eq!(
            seen[0],
            vec![
                "mksquashfs", "/mnt/root", "/out/root.sqsh", "-comp", "xz", "-noappend",
            ]
        );
    }

    #[test]
    fn nonzero_exit_becomes_external_tool_failed() {
        let runner = FakeRunner {
            stdout: b"".to_vec(),
            stderr: b"no such device".to_vec(),
            exit_code: 1,
            seen: RefCell::new(vec![]),
        };
        let err = umount(&runner, Path::new("/mnt/x")).unwrap_err();
        match err {
            ImgDiskError::ExternalToolFailed(e) => {
                assert_eq!(e.argv, vec!["umount", "/mnt/x"]);
                assert_eq!(e.stderr, b"no such device");
            }
            other => panic!("expected ExternalToolFailed, got {other:?}"),
        }
    }

    #[test]
    fn umount_lazy_best_effort_never_panics_on_failure() {
        let runner = FakeRunner {
            stdout: vec![],
            stderr: vec![],
            exit_code: 1,
            seen: RefCell::new(vec![]),
        };
        umount_lazy_best_effort(&runner, Path::new("/mnt/gone"));
    }
}
