//! Linux TUN realization of the platform seam.
//!
//! Establishes a real TUN device for each routing configuration: the
//! device gets the point-to-point address, MTU, and a default route in a
//! dedicated policy table, and a drain task reads every captured packet
//! and discards it. Nothing is ever forwarded upstream, so any traffic
//! steered into the device dead-ends.
//!
//! Per-application traffic classification has no direct Linux equivalent
//! of the hosting platform's allow-list; steering selected applications
//! into the policy table (e.g. via cgroup or uid-range rules) is left to
//! the integrator. The allow-list is logged with each establishment.
//!
//! Requires root or `CAP_NET_ADMIN`.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::process::Command;

use tracing::{debug, info, trace, warn};

use super::platform::{InterfaceHandle, Platform};
use super::routing::RoutingConfiguration;
use crate::error::{Error, Result};

/// Policy routing table that receives the catch-all route.
const ROUTE_TABLE: u32 = 8020;

/// TUN-backed platform implementation.
pub struct TunPlatform {
    /// Device name hint; the kernel may assign a different name.
    name_hint: String,
}

struct TunResource {
    name: String,
    drain: tokio::task::JoinHandle<()>,
}

impl TunPlatform {
    /// Create a platform that names devices after the given hint
    /// (truncated to the kernel's 15-character limit).
    pub fn new(name_hint: impl Into<String>) -> Self {
        Self {
            name_hint: name_hint.into(),
        }
    }

    fn create_device(&self, mtu: u16) -> Result<(String, File)> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let tun_file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open("/dev/net/tun")
            .map_err(Error::Io)?;

        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };

        // Copy name (max 15 chars + null terminator)
        let name_bytes = self.name_hint.as_bytes();
        let name_len = name_bytes.len().min(15);
        unsafe {
            std::ptr::copy_nonoverlapping(
                name_bytes.as_ptr(),
                ifr.ifr_name.as_mut_ptr().cast::<u8>(),
                name_len,
            );
        }

        // IFF_TUN = layer-3 device, IFF_NO_PI = no packet info header
        ifr.ifr_ifru.ifru_flags = (libc::IFF_TUN | libc::IFF_NO_PI) as i16;

        const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
        let ret = unsafe { libc::ioctl(tun_file.as_raw_fd(), TUNSETIFF, &mut ifr) };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        let actual_name = unsafe {
            std::ffi::CStr::from_ptr(ifr.ifr_name.as_ptr())
                .to_string_lossy()
                .into_owned()
        };

        debug!(requested = %self.name_hint, actual = %actual_name, mtu, "Created TUN device");
        Ok((actual_name, tun_file))
    }

    fn configure_device(&self, name: &str, config: &RoutingConfiguration) -> Result<()> {
        run_ip(&["link", "set", "dev", name, "mtu", &config.mtu.to_string()])?;
        run_ip(&[
            "addr",
            "add",
            &format!("{}/{}", config.address, config.prefix),
            "dev",
            name,
        ])?;
        run_ip(&["link", "set", "dev", name, "up"])?;

        // Catch-all route goes into a dedicated table so it only captures
        // traffic explicitly steered there.
        run_ip(&[
            "route",
            "add",
            "default",
            "dev",
            name,
            "table",
            &ROUTE_TABLE.to_string(),
        ])?;

        Ok(())
    }

    /// Read and discard captured packets until the task is aborted.
    ///
    /// The task owns the device file: the descriptor stays valid for as
    /// long as any read can touch it and closes only when the aborted
    /// task is dropped, which also removes the device.
    fn spawn_drain(name: String, file: File, mtu: u16) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let async_fd = match tokio::io::unix::AsyncFd::new(file) {
                Ok(afd) => afd,
                Err(e) => {
                    warn!(interface = %name, error = %e, "Drain task failed to register fd");
                    return;
                }
            };
            let fd = async_fd.get_ref().as_raw_fd();

            let mut buf = vec![0u8; usize::from(mtu) + 4];
            let mut dropped: u64 = 0;

            loop {
                let mut guard = match async_fd.readable().await {
                    Ok(g) => g,
                    Err(_) => break,
                };

                match guard.try_io(|_| {
                    let ret =
                        unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
                    if ret < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(ret as usize)
                    }
                }) {
                    Ok(Ok(len)) => {
                        dropped += 1;
                        trace!(interface = %name, len, dropped, "Dropped captured packet");
                    }
                    Ok(Err(_)) => break,
                    Err(_would_block) => {}
                }
            }

            debug!(interface = %name, dropped, "Drain task finished");
        })
    }
}

impl Platform for TunPlatform {
    fn establish(&self, config: &RoutingConfiguration) -> Result<Option<InterfaceHandle>> {
        let (name, file) = self.create_device(config.mtu)?;

        if let Err(e) = self.configure_device(&name, config) {
            // The device disappears when the fd drops.
            warn!(interface = %name, error = %e, "Device configuration failed");
            return Ok(None);
        }

        info!(
            interface = %name,
            session = %config.session,
            address = %config.address,
            allowed = ?config.allow_list(),
            "Virtual interface established"
        );

        let drain = Self::spawn_drain(name.clone(), file, config.mtu);

        Ok(Some(InterfaceHandle::new(
            name.clone(),
            Box::new(TunResource { name, drain }),
        )))
    }

    fn close(&self, handle: InterfaceHandle) -> Result<()> {
        let resource = handle.into_resource();
        let Ok(resource) = resource.downcast::<TunResource>() else {
            return Err(Error::Internal("foreign handle passed to TUN platform".into()));
        };

        resource.drain.abort();

        // Route table cleanup is best-effort; the route dies with the
        // device anyway.
        let _ = run_ip(&["route", "flush", "table", &ROUTE_TABLE.to_string()]);

        debug!(interface = %resource.name, "Closing TUN device");
        // The drain task owns the device fd; the interface is removed
        // once the aborted task is dropped.
        Ok(())
    }
}

fn run_ip(args: &[&str]) -> Result<()> {
    let output = Command::new("ip").args(args).output().map_err(Error::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Re-running against existing state is not an error.
        if stderr.contains("File exists") {
            return Ok(());
        }
        return Err(Error::Internal(format!(
            "ip {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::FromRawFd;

    fn nonblocking_pipe() -> (File, File) {
        let mut fds = [0i32; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) };
        assert_eq!(ret, 0, "pipe2 failed: {}", io::Error::last_os_error());
        unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) }
    }

    /// The drain task must own its descriptor: the fd stays valid while
    /// the task can still read it and closes only when the aborted task
    /// is dropped, never while a read may be in flight elsewhere.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_task_owns_its_descriptor() {
        let (read_end, write_end) = nonblocking_pipe();

        let drain = TunPlatform::spawn_drain("test-drain".into(), read_end, 1500);

        // While the task runs, the read end is open: writes land.
        let payload = [0u8; 16];
        let written = unsafe {
            libc::write(
                write_end.as_raw_fd(),
                payload.as_ptr().cast(),
                payload.len(),
            )
        };
        assert_eq!(written, 16);

        drain.abort();
        let _ = drain.await;

        // The dropped task was the only holder of the read end, so the
        // pipe is now broken for the writer.
        let ret = unsafe {
            libc::write(
                write_end.as_raw_fd(),
                payload.as_ptr().cast(),
                payload.len(),
            )
        };
        assert_eq!(ret, -1);
        assert_eq!(
            io::Error::last_os_error().raw_os_error(),
            Some(libc::EPIPE)
        );
    }
}
