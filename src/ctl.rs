// Author: Lukas Bower
// Purpose: Synthetic control file whose writes drive server actions.

use std::sync::Weak;
use std::thread;

use log::{info, warn};

use crate::command;
use crate::fsys::{FsCore, Fsys};
use crate::FsError;

/// The write-only `/adm/ctl` file.
///
/// The only command is `listen NETWORK ADDRESS`, which starts another
/// listener on a background thread. Reads always fail.
#[derive(Debug)]
pub(crate) struct CtlFile {
    fs: Weak<FsCore>,
}

impl CtlFile {
    pub fn new(fs: Weak<FsCore>) -> Self {
        Self { fs }
    }

    pub fn read_at(&self, _buf: &mut [u8], _offset: u64) -> Result<usize, FsError> {
        Err(FsError::CtlRead)
    }

    pub fn write_at(&self, p: &[u8]) -> Result<usize, FsError> {
        let cmd = command::parse(p)?;
        match cmd.name.as_str() {
            "listen" => {
                if cmd.args.len() != 2 {
                    return Err(FsError::RequiresTwoArgs("listen"));
                }
                let network = cmd.args[0].clone();
                let addr = cmd.args[1].clone();
                info!(target: "nine-vault", "ctl: listen {network} {addr}");
                let fs = self.fs.clone();
                thread::spawn(move || {
                    let Some(core) = fs.upgrade() else {
                        return;
                    };
                    if let Err(err) = Fsys::from_core(core).listen(&network, &addr) {
                        warn!(target: "nine-vault", "ctl: listen {network} {addr}: {err}");
                    }
                });
                Ok(p.len())
            }
            _ => Err(FsError::UnknownCommand(cmd.name)),
        }
    }

    pub fn len(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_ctl() -> CtlFile {
        CtlFile::new(Weak::new())
    }

    #[test]
    fn reads_always_fail() {
        let ctl = detached_ctl();
        let mut buf = [0u8; 8];
        assert_eq!(ctl.read_at(&mut buf, 0), Err(FsError::CtlRead));
    }

    #[test]
    fn rejects_unknown_commands() {
        let ctl = detached_ctl();
        assert_eq!(
            ctl.write_at(b"reboot now please"),
            Err(FsError::UnknownCommand("reboot".to_owned()))
        );
        assert_eq!(
            ctl.write_at(b"listen tcp"),
            Err(FsError::RequiresTwoArgs("listen"))
        );
        assert_eq!(ctl.write_at(b"  "), Err(FsError::CommandNameMissing));
    }

    #[test]
    fn listen_write_is_accepted() {
        // The listener itself is spawned asynchronously; the write only
        // validates the command shape.
        let ctl = detached_ctl();
        let n = ctl.write_at(b"listen tcp 127.0.0.1:0").expect("listen");
        assert_eq!(n, "listen tcp 127.0.0.1:0".len());
    }
}
