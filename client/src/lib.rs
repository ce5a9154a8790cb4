//! # Dice Duel Terminal Client
//!
//! Thin console front-end for the dice duel server. It prints every line the
//! server sends and, whenever the server asks for a roll, reads one line from
//! the console and forwards it unchanged. All game rules live on the server;
//! the client only needs to recognise the roll prompt and the final result
//! line.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:1014").await?;
//!     let mut console = BufReader::new(stdin());
//!     let mut display = stdout();
//!
//!     let finish = client.run(&mut console, &mut display).await?;
//!     println!("{:?}", finish);
//!     Ok(())
//! }
//! ```

pub mod network;
