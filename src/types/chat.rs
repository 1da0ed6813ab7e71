use serde::{Deserialize, Serialize};

/// The two assistant personas the app ships with. Anything unrecognized
/// falls back to Eva, the default companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Eva,
    Alfred,
}

impl Persona {
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some(mode) if mode.eq_ignore_ascii_case("alfred") => Persona::Alfred,
            _ => Persona::Eva,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::Eva => {
                "You are Eva, a warm and encouraging wellbeing companion. \
                 Keep answers short and kind."
            }
            Persona::Alfred => {
                "You are Alfred, a pragmatic productivity coach. \
                 Keep answers short and concrete."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn from_mode__should_default_to_eva() {
        // Then
        assert_eq!(Persona::from_mode(None), Persona::Eva);
        assert_eq!(Persona::from_mode(Some("eva")), Persona::Eva);
        assert_eq!(Persona::from_mode(Some("something-else")), Persona::Eva);
    }

    #[test]
    fn from_mode__should_select_alfred_case_insensitively() {
        // Then
        assert_eq!(Persona::from_mode(Some("alfred")), Persona::Alfred);
        assert_eq!(Persona::from_mode(Some("Alfred")), Persona::Alfred);
    }
}
