use crate::net::protocol::ProtocolError;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Reading half of a framed connection. Frames are a u16 little-endian
/// length followed by that many payload bytes.
pub trait FrameReader: Send {
    /// `Ok(None)` on a clean close between frames.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError>;
}

pub trait FrameWriter: Send {
    fn write_frame(&mut self, body: &[u8]) -> Result<(), ProtocolError>;
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Splits into independently owned halves so reads and writes can run
    /// on separate threads.
    pub fn split(self) -> Result<(TcpFrameReader, TcpFrameWriter), ProtocolError> {
        self.stream.set_nonblocking(false)?;
        let writer = self.stream.try_clone()?;
        Ok((
            TcpFrameReader {
                stream: self.stream,
            },
            TcpFrameWriter { stream: writer },
        ))
    }
}

pub struct TcpFrameReader {
    stream: TcpStream,
}

pub struct TcpFrameWriter {
    stream: TcpStream,
}

impl TcpFrameWriter {
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

impl FrameReader for TcpFrameReader {
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        read_frame(&mut self.stream)
    }
}

impl FrameWriter for TcpFrameWriter {
    fn write_frame(&mut self, body: &[u8]) -> Result<(), ProtocolError> {
        write_frame(&mut self.stream, body)
    }
}

pub fn read_frame<R: Read>(source: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut header = [0u8; 2];
    match source.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u16::from_le_bytes(header) as usize;
    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    let mut body = vec![0u8; len];
    source.read_exact(&mut body)?;
    Ok(Some(body))
}

pub fn write_frame<W: Write>(sink: &mut W, body: &[u8]) -> Result<(), ProtocolError> {
    let len = u16::try_from(body.len()).map_err(|_| ProtocolError::FrameTooLarge(body.len()))?;
    sink.write_all(&len.to_le_bytes())?;
    sink.write_all(body)?;
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn frames_are_length_prefixed() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &[1, 2, 3]).expect("write");
        assert_eq!(buffer, vec![3, 0, 1, 2, 3]);
        let mut cursor = Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor).expect("read"), Some(vec![1, 2, 3]));
        assert_eq!(read_frame(&mut cursor).expect("eof"), None);
    }

    #[test]
    fn oversized_and_empty_frames_are_rejected() {
        let mut buffer = Vec::new();
        assert!(matches!(
            write_frame(&mut buffer, &vec![0u8; MAX_FRAME_LEN + 1]),
            Err(ProtocolError::FrameTooLarge(_))
        ));
        let mut cursor = Cursor::new(vec![0u8, 0u8]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::EmptyFrame)
        ));
    }

    #[test]
    fn tcp_halves_exchange_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let (mut reader, mut writer) = TcpTransport::new(stream).split().expect("split");
            let frame = reader.read_frame().expect("read").expect("frame");
            writer.write_frame(&frame).expect("echo");
        });
        let mut client = TcpStream::connect(addr).expect("connect");
        write_frame(&mut client, b"ping").expect("send");
        assert_eq!(read_frame(&mut client).expect("read"), Some(b"ping".to_vec()));
        server.join().expect("join");
    }
}
