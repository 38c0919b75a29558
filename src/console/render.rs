use std::io;
use std::path::Path;
use std::sync::Arc;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use crate::models::packet::{PacketRecord, Protocol};

/// Destination for whole console lines.
///
/// Both loops print concurrently; each line is rendered into its own buffer
/// and emitted in one piece so lines never interleave.
pub trait ConsoleWriter: Send {
    /// Fresh buffer matching the writer's colour support
    fn buffer(&self) -> Buffer;

    /// Emit a rendered buffer
    fn print(&mut self, buffer: &Buffer) -> io::Result<()>;

    /// Render with `draw` and emit the result
    fn emit<F>(&mut self, draw: F) -> io::Result<()>
    where
        F: FnOnce(&mut Buffer) -> io::Result<()>,
        Self: Sized,
    {
        let mut buffer = self.buffer();
        draw(&mut buffer)?;
        self.print(&buffer)
    }
}

/// Standard output, shared between tasks
#[derive(Clone)]
pub struct Console {
    writer: Arc<BufferWriter>,
}

impl Console {
    pub fn stdout(choice: ColorChoice) -> Self {
        Self {
            writer: Arc::new(BufferWriter::stdout(choice)),
        }
    }
}

impl ConsoleWriter for Console {
    fn buffer(&self) -> Buffer {
        self.writer.buffer()
    }

    fn print(&mut self, buffer: &Buffer) -> io::Result<()> {
        self.writer.print(buffer)
    }
}

fn protocol_color(protocol: Protocol) -> Color {
    match protocol {
        Protocol::Tcp => Color::Cyan,
        Protocol::Udp => Color::Green,
        Protocol::Icmp => Color::Yellow,
        Protocol::Other => Color::Magenta,
    }
}

/// Write one packet line in its protocol colour
pub fn write_packet<W: WriteColor>(out: &mut W, packet: &PacketRecord) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(protocol_color(packet.protocol()))))?;
    write!(out, "{}", packet.summary_line())?;
    out.reset()?;
    writeln!(out)
}

/// Startup banner: where the capture goes and which commands exist
pub fn write_banner<W: WriteColor>(out: &mut W, capture_file: &Path) -> io::Result<()> {
    let mut green = ColorSpec::new();
    green.set_fg(Some(Color::Green));

    writeln!(out)?;
    out.set_color(&green)?;
    write!(out, "Saving capture to:")?;
    out.reset()?;
    writeln!(out, " {}", capture_file.display())?;

    out.set_color(&green)?;
    writeln!(out, "Commands:")?;
    out.reset()?;
    writeln!(out, "  filter tcp | udp | icmp | port 80 | host 8.8.8.8")?;
    writeln!(out, "  filter clear")?;
    writeln!(out, "  pause | resume")?;
    writeln!(out, "  stop")?;
    writeln!(out)
}

/// Write `message` on its own line in `color`
pub fn write_notice<W: WriteColor>(out: &mut W, color: Color, message: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(out, "{}", message)?;
    out.reset()?;
    writeln!(out)
}
