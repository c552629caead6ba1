//! Poll driver tying a [`Session`] to its host and line channels.

use crate::channel::ByteChannel;
use crate::error::LinkResult;
use crate::session::Session;
use crate::time::LinkTime;

/// A session wired to a host channel `H` and a line channel `L`.
#[derive(Debug)]
pub struct Link<H, L> {
    session: Session,
    host: H,
    line: L,
}

impl<H: ByteChannel, L: ByteChannel> Link<H, L> {
    /// Wire a session to its channels.
    pub fn new(session: Session, host: H, line: L) -> Self {
        Link { session, host, line }
    }

    /// The session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The session, mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// The host channel.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host channel, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The line channel.
    pub fn line(&self) -> &L {
        &self.line
    }

    /// The line channel, mutably.
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// Take the link apart.
    pub fn into_parts(self) -> (Session, H, L) {
        (self.session, self.host, self.line)
    }

    /// One pass of the poll loop.
    ///
    /// Drains host input, then line input, flushes both outputs and runs the
    /// timers. Frames produced by the timers are flushed before returning.
    /// A host ring overflow is reported after the pass completes.
    pub fn poll(&mut self, now: LinkTime) -> LinkResult<()> {
        let mut host_in = Vec::with_capacity(self.host.bytes_available());
        while let Some(byte) = self.host.read_byte() {
            host_in.push(byte);
        }
        let host_result = self.session.push_host(&host_in, now);

        while let Some(byte) = self.line.read_byte() {
            self.session.push_line_byte(byte, now);
        }

        self.flush();
        self.session.poll(now);
        self.flush();

        host_result
    }

    fn flush(&mut self) {
        if self.session.has_line_output() {
            let out = self.session.take_line_output();
            self.line.write(&out);
        }
        let delivered = self.session.take_host_output();
        if !delivered.is_empty() {
            self.host.write(&delivered);
        }
    }
}
