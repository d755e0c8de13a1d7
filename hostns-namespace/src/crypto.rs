//! LUKS volume management through `cryptsetup` on the host

use std::time::Duration;

use hostns_core::{Error, Result};
use hostns_core::constants::BINARY_CRYPTSETUP;
use tracing::{debug, info};

use crate::executor::NamespaceExecutor;

/// Passphrase is read from stdin
const KEY_FILE_STDIN: [&str; 2] = ["-d", "-"];

/// Exit code of `cryptsetup isLuks` for a device without a LUKS header
const NOT_LUKS_EXIT_CODE: i32 = 1;

fn to_args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

fn luks_open_args(volume: &str, device: &str) -> Vec<String> {
    let mut args = to_args(["luksOpen", device, volume]);
    args.extend(KEY_FILE_STDIN.map(String::from));
    args
}

fn luks_format_args(device: &str, cipher: &str, hash: &str, key_size: &str, pbkdf: &str) -> Vec<String> {
    let mut args = to_args([
        "-q",
        "luksFormat",
        "--type",
        "luks2",
        "--cipher",
        cipher,
        "--hash",
        hash,
        "--key-size",
        key_size,
        "--pbkdf",
        pbkdf,
        device,
    ]);
    args.extend(KEY_FILE_STDIN.map(String::from));
    args
}

impl NamespaceExecutor {
    /// Open `device` as the mapped volume `volume`
    pub async fn luks_open(
        &self,
        volume: &str,
        device: &str,
        passphrase: &str,
        timeout: Duration,
    ) -> Result<String> {
        info!(volume, device, "Opening LUKS volume");
        self.execute_with_stdin_pipe(
            &[],
            BINARY_CRYPTSETUP,
            &luks_open_args(volume, device),
            passphrase,
            timeout,
        )
        .await
    }

    /// Close the mapped volume `volume`
    pub async fn luks_close(&self, volume: &str, timeout: Duration) -> Result<String> {
        info!(volume, "Closing LUKS volume");
        self.execute(&[], BINARY_CRYPTSETUP, &to_args(["luksClose", volume]), timeout)
            .await
    }

    /// Write a LUKS2 header to `device`
    #[allow(clippy::too_many_arguments)]
    pub async fn luks_format(
        &self,
        device: &str,
        passphrase: &str,
        cipher: &str,
        hash: &str,
        key_size: &str,
        pbkdf: &str,
        timeout: Duration,
    ) -> Result<String> {
        info!(device, cipher, hash, key_size, pbkdf, "Formatting LUKS device");
        self.execute_with_stdin_pipe(
            &[],
            BINARY_CRYPTSETUP,
            &luks_format_args(device, cipher, hash, key_size, pbkdf),
            passphrase,
            timeout,
        )
        .await
    }

    /// Grow the mapped volume `volume` to its underlying device
    pub async fn luks_resize(
        &self,
        volume: &str,
        passphrase: &str,
        timeout: Duration,
    ) -> Result<String> {
        info!(volume, "Resizing LUKS volume");
        self.execute_with_stdin_pipe(
            &[],
            BINARY_CRYPTSETUP,
            &to_args(["resize", volume]),
            passphrase,
            timeout,
        )
        .await
    }

    /// Status report of the mapped volume `volume`
    pub async fn luks_status(&self, volume: &str, timeout: Duration) -> Result<String> {
        self.execute(&[], BINARY_CRYPTSETUP, &to_args(["status", volume]), timeout)
            .await
    }

    /// Whether `device` carries a LUKS header
    pub async fn is_luks(&self, device: &str, timeout: Duration) -> Result<bool> {
        match self
            .execute(&[], BINARY_CRYPTSETUP, &to_args(["isLuks", device]), timeout)
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::Execution {
                exit_code: Some(NOT_LUKS_EXIT_CODE),
                ..
            }) => {
                debug!(device, "Device is not LUKS formatted");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luks_open_args() {
        assert_eq!(
            luks_open_args("vol", "/dev/sdb"),
            vec!["luksOpen", "/dev/sdb", "vol", "-d", "-"]
        );
    }

    #[test]
    fn test_luks_format_args() {
        assert_eq!(
            luks_format_args("/dev/sdb", "aes-xts-plain64", "sha256", "256", "argon2i"),
            vec![
                "-q",
                "luksFormat",
                "--type",
                "luks2",
                "--cipher",
                "aes-xts-plain64",
                "--hash",
                "sha256",
                "--key-size",
                "256",
                "--pbkdf",
                "argon2i",
                "/dev/sdb",
                "-d",
                "-"
            ]
        );
    }
}
