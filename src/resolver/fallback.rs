//! Deterministic keyword responder used when the response service is
//! unavailable or fails.

use chrono::Local;

enum Reply {
    Text(&'static str),
    CurrentTime,
}

/// Keyword table, scanned in order. First case-insensitive substring match wins.
const KEYWORDS: &[(&str, Reply)] = &[
    ("hello", Reply::Text("Hello! How can I help you?")),
    ("time", Reply::CurrentTime),
    ("weather", Reply::Text("The weather is looking great today!")),
    ("name", Reply::Text("I am Jarvis, your voice assistant.")),
    ("test", Reply::Text("STT is working perfectly!")),
];

fn local_time() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

pub struct FallbackResponder {
    clock: fn() -> String,
}

impl FallbackResponder {
    pub fn new() -> Self {
        Self { clock: local_time }
    }

    /// Use a fixed clock for the time reply.
    pub fn with_clock(clock: fn() -> String) -> Self {
        Self { clock }
    }

    /// Canned reply for `input`, or an acknowledgement echoing it.
    pub fn respond(&self, input: &str, provider_configured: bool) -> String {
        let lower = input.to_lowercase();
        for (keyword, reply) in KEYWORDS {
            if lower.contains(keyword) {
                return match reply {
                    Reply::Text(text) => (*text).to_string(),
                    Reply::CurrentTime => format!("It's {}", (self.clock)()),
                };
            }
        }

        let status = if provider_configured {
            "The response service is configured but could not answer right now."
        } else {
            "Using offline responses."
        };
        format!("You said: \"{}\". {}", input, status)
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}
