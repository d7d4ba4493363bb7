use async_trait::async_trait;
use log::warn;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::device::platform::{Alerts, ChooserEntry, DeviceChooser};
use crate::error::alert_msgbox;

/// Lets the user pick a device by typing its number. Anything else cancels.
pub struct ConsoleChooser;

pub fn parse_choice(line: &str, entries: &[ChooserEntry]) -> Option<String> {
    let index = line.trim().parse::<usize>().ok()?;
    index.checked_sub(1)
        .and_then(|index| entries.get(index))
        .map(|entry| entry.id.clone())
}

#[async_trait]
impl DeviceChooser for ConsoleChooser {
    async fn choose(&self, entries: Vec<ChooserEntry>) -> Option<String> {
        let mut prompt = String::new();
        if entries.is_empty() {
            prompt.push_str("No devices found.\n");
            return print_prompt(&prompt).await.and(None);
        }

        for (index, entry) in entries.iter().enumerate() {
            prompt.push_str(&format!("{:>3}. {}\n", index + 1, entry.label()));
        }
        prompt.push_str("Pair with device number (empty to cancel): ");
        print_prompt(&prompt).await?;

        let mut line = String::new();
        let mut reader = BufReader::new(stdin());
        if let Err(err) = reader.read_line(&mut line).await {
            warn!("Failed to read device choice: {}", err);
            return None;
        }

        parse_choice(&line, &entries)
    }
}

async fn print_prompt(prompt: &str) -> Option<()> {
    let mut out = stdout();
    let result = async {
        out.write_all(prompt.as_bytes()).await?;
        out.flush().await
    }.await;

    match result {
        Ok(()) => Some(()),
        Err(err) => {
            warn!("Failed to print device chooser: {}", err);
            None
        },
    }
}

/// Shows alerts as native message boxes.
pub struct MsgboxAlerts;

impl Alerts for MsgboxAlerts {
    fn alert(&self, message: &str) {
        alert_msgbox(message);
    }
}
