pub use std::process::Command;

#[cfg(unix)]
use std::os::fd::OwnedFd as OwnedImpl;
#[cfg(windows)]
use std::os::fd::OwnedHandle as OwnedImpl;

/// Arranges for `cmd` to run in its own process group and, on unix, to
/// receive SIGKILL if this process dies before it does. This lets a
/// supervisor reap an entire child process tree with one signal to the
/// group, and guarantees children don't outlive a crashed parent.
#[cfg(unix)]
pub fn new_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn new_process_group(_cmd: &mut Command) {}

/// Sends `signal` to the process group led by `pid`, as established by
/// [`new_process_group`]. No-op on platforms without process groups.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        // ESRCH means the group is already gone: not an error for our purposes.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: i32) -> std::io::Result<()> {
    Ok(())
}

pub struct Child {
    inner: std::process::Child,
    kill_on_drop: bool,

    pub stdin: Option<ChildStdio>,
    pub stdout: Option<ChildStdio>,
    pub stderr: Option<ChildStdio>,
}

pub type ChildStdio = tokio::fs::File;

impl From<std::process::Child> for Child {
    fn from(mut inner: std::process::Child) -> Self {
        let stdin = map_stdio(inner.stdin.take());
        let stdout = map_stdio(inner.stdout.take());
        let stderr = map_stdio(inner.stderr.take());

        Self {
            inner,
            kill_on_drop: false,
            stdin,
            stdout,
            stderr,
        }
    }
}

impl Child {
    pub fn kill_on_drop(&mut self, v: bool) {
        self.kill_on_drop = v;
    }

    pub fn id(&self) -> u32 {
        self.inner.id()
    }

    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.inner.kill()
    }

    pub fn try_wait(&mut self) -> std::io::Result<Option<std::process::ExitStatus>> {
        self.inner.try_wait()
    }

    pub async fn wait(mut self) -> std::io::Result<std::process::ExitStatus> {
        let handle = tokio::runtime::Handle::current().spawn_blocking(move || self.inner.wait());
        handle.await.expect("wait does not panic")
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        if self.kill_on_drop {
            _ = self.inner.kill()
        }
    }
}

fn map_stdio<F>(f: Option<F>) -> Option<ChildStdio>
where
    F: Into<OwnedImpl>,
{
    let f: Option<OwnedImpl> = f.map(Into::into);
    let f: Option<std::fs::File> = f.map(Into::into);
    f.map(Into::into)
}
