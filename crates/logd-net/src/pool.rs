use std::sync::Mutex;

/// Large enough for a typical MTU-bounded datagram.
pub const MAX_PACKET_SIZE: usize = 1920;

const POOL_CAP: usize = 4096;

/// A received datagram borrowed from the [`PacketPool`]: the owning buffer
/// plus the number of bytes `recv_from` actually filled.
pub struct Packet {
    buf: Box<[u8; MAX_PACKET_SIZE]>,
    len: usize,
}

impl Packet {
    pub(crate) fn new(buf: Box<[u8; MAX_PACKET_SIZE]>, len: usize) -> Self {
        Self { buf, len }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// A free list of fixed-size receive buffers, avoiding a fresh allocation
/// for every inbound datagram. Workers return buffers after dispatch.
pub struct PacketPool {
    free: Mutex<Vec<Box<[u8; MAX_PACKET_SIZE]>>>,
}

impl PacketPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn acquire(&self) -> Box<[u8; MAX_PACKET_SIZE]> {
        self.free
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Box::new([0u8; MAX_PACKET_SIZE]))
    }

    pub fn release(&self, packet: Packet) {
        let mut free = self.free.lock().unwrap();
        if free.len() < POOL_CAP {
            free.push(packet.buf);
        }
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffer_is_reused() {
        let pool = PacketPool::new();
        let mut buf = pool.acquire();
        buf[..4].copy_from_slice(b"abcd");
        let ptr_before = buf.as_ptr();
        let p1 = Packet::new(buf, 4);
        assert_eq!(p1.as_slice(), b"abcd");
        pool.release(p1);

        let mut buf = pool.acquire();
        assert_eq!(buf.as_ptr(), ptr_before, "released buffer should be reused");
        buf[..3].copy_from_slice(b"xyz");
        let p2 = Packet::new(buf, 3);
        assert_eq!(p2.as_slice(), b"xyz");
    }
}
