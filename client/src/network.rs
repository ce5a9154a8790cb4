//! Client network layer: relays the server's lines to the terminal
//!
//! The client holds no game rules. It prints whatever the server sends and,
//! when a line asks for a roll, forwards one line typed at the console.

use log::{debug, info};
use shared::{is_final_line, is_roll_prompt};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;

/// How a terminal game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The server announced the result.
    GameOver,
    /// The server closed the connection first.
    ServerClosed,
    /// The console ran out of input at a prompt.
    ConsoleClosed,
}

pub struct Client<S> {
    server: BufReader<S>,
}

impl Client<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            server: BufReader::new(stream),
        }
    }

    /// Echoes server lines to `display` and answers roll prompts with lines
    /// read from `console`.
    pub async fn run<C, D>(
        &mut self,
        console: &mut C,
        display: &mut D,
    ) -> Result<Finish, Box<dyn std::error::Error>>
    where
        C: AsyncBufRead + Unpin,
        D: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            if self.server.read_line(&mut line).await? == 0 {
                info!("Server closed the connection");
                return Ok(Finish::ServerClosed);
            }
            let message = line.trim_end();

            display.write_all(message.as_bytes()).await?;
            display.write_all(b"\n").await?;

            if is_final_line(message) {
                display.flush().await?;
                return Ok(Finish::GameOver);
            }

            if is_roll_prompt(message) {
                display.write_all(b"Enter 'Roll': ").await?;
                display.flush().await?;

                let mut command = String::new();
                if console.read_line(&mut command).await? == 0 {
                    debug!("Console closed at a roll prompt");
                    return Ok(Finish::ConsoleClosed);
                }

                let stream = self.server.get_mut();
                stream.write_all(command.trim_end().as_bytes()).await?;
                stream.write_all(b"\n").await?;
                stream.flush().await?;
            }
        }
    }
}
