//! Plain byte-stream transports
//!
//! A [`Transport`] is the already-connected socket the TLS layer is stacked on:
//! either the target itself or a forward proxy. The TLS session takes ownership
//! of it and closes it when the session is closed.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Raw, connected byte stream
pub trait Transport: Read + Write {
    /// Wait until the transport is ready for `events`
    ///
    /// Returns false when the timeout expires first. `None` waits forever.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool>;

    /// Switch reads and writes between blocking and would-block behavior
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Shut down both directions of the stream
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        poll_fd(self.as_raw_fd(), events, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        (**self).poll(events, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}

/// Poll a raw file descriptor
pub(crate) fn poll_fd(
    fd: std::os::fd::RawFd,
    events: PollEvents,
    timeout: Option<Duration>,
) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(result > 0)
}
