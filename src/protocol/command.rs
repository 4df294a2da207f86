#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Presets,
    BatchLoad,
    BatchStart,
    BatchStatus,
    BatchWait,
    ItemRetry,
    ItemExport,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "presets" => Command::Presets,
            "batch.load" => Command::BatchLoad,
            "batch.start" => Command::BatchStart,
            "batch.status" => Command::BatchStatus,
            "batch.wait" => Command::BatchWait,
            "item.retry" => Command::ItemRetry,
            "item.export" => Command::ItemExport,
            _ => Command::Unknown,
        }
    }
}
