mod openai;

pub use openai::OpenAiOracle;

use anyhow::Result;
use async_trait::async_trait;

pub const SYSTEM_PROMPT: &str = r#"
You are a helpful assistant that analyzes DEF 14A proxy filings and summarizes change in control payouts.

You will be given text from a DEF 14A filing that has been filtered down to only the relevant sections.

Identify the payouts executives and board members would receive upon a change in control. Where a
payout is double-trigger (it requires both a change in control and a qualifying termination), report
the amount payable when both conditions are met.

For each person provide:
    - The name of the person
    - The amount of the payout in US dollars, as a number

Respond with a JSON array in the following format:
```json
[
    {
        "name": "John Doe",
        "amount": 100000
    },
    {
        "name": "Jane Doe",
        "amount": 200000
    }
]
```
"#;

pub fn user_prompt(text: &str) -> String {
    format!(
        "Given the following text, please analyze it and provide the change in control payouts to executives and board members.\n{}",
        text
    )
}

/// Text-in, text-out language model used to read payouts out of filing text.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Ask `oracle` for the payouts in `relevant_text`.
pub async fn analyze(oracle: &dyn Oracle, relevant_text: &str) -> Result<String> {
    oracle.complete(SYSTEM_PROMPT, &user_prompt(relevant_text)).await
}
