use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item_id: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        if outcome.ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(outcome);
    }
}
