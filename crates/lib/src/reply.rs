//! Rule-based replies for the mock backend: ordered keyword rules, first match wins.

/// One rule: any keyword (lowercase substring) selects the reply.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
}

impl Rule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

const CODE_SAMPLE: &str = "Here's a simple Python example for you:

```python
def greet(name):
    return f\"Hello, {name}! Welcome to coding!\"

# Usage
print(greet(\"User\"))
```

Let me know if you need something more specific!";

const DEFAULT_RULES: &[Rule] = &[
    Rule {
        keywords: &["hello", "hi"],
        reply: "Hello! It's wonderful to meet you. I'm Zara, created by Sri. How are you feeling today?",
    },
    Rule {
        keywords: &["who are you", "your name"],
        reply: "I'm Zara, a friendly and intelligent AI assistant created by Sri. I'm here to help you with anything from coding to emotional support.",
    },
    Rule {
        keywords: &["sri"],
        reply: "Sri is my creator! He designed me to be helpful, emotionally aware, and professional.",
    },
    Rule {
        keywords: &["help"],
        reply: "I'd be happy to help! Whether it's technical coding, career advice, or just a chat, I'm here for you. What do you need assistance with?",
    },
    Rule {
        keywords: &["python", "code", "programming", "function"],
        reply: CODE_SAMPLE,
    },
    Rule {
        keywords: &["sad", "frustrated", "stressed", "upset"],
        reply: "I'm so sorry to hear you're feeling that way. It's completely normal to have tough days. I'm here to listen if you want to talk about it, or we can focus on something else to help you reset. You're doing great. ❤️",
    },
];

/// Number of characters of the message echoed by the fallback reply.
const ECHO_CHARS: usize = 30;

/// Ordered rule list with a fallback that echoes the start of the message.
#[derive(Debug, Clone)]
pub struct ReplyRules {
    rules: Vec<Rule>,
}

impl Default for ReplyRules {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

impl ReplyRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn reply(&self, message: &str) -> String {
        let lowered = message.to_lowercase();
        match self.rules.iter().find(|r| r.matches(&lowered)) {
            Some(rule) => rule.reply.to_string(),
            None => {
                let head: String = message.chars().take(ECHO_CHARS).collect();
                format!(
                    "That's interesting! I'm listening. Tell me more about \"{}...\" or feel free to ask me anything else.",
                    head
                )
            }
        }
    }
}
