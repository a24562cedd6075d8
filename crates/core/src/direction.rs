use serde::{Deserialize, Serialize};

/// Exchange direction with respect to the node that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// The complementary direction: `Input` as seen from one side of an
    /// exchange is `Output` as seen from the other.
    pub fn complement(self) -> Direction {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "Input"),
            Direction::Output => write!(f, "Output"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Input" => Ok(Direction::Input),
            "Output" => Ok(Direction::Output),
            other => Err(format!("unrecognized direction: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_round_trips() {
        assert_eq!(Direction::Input.complement(), Direction::Output);
        assert_eq!(Direction::Output.complement(), Direction::Input);
        assert_eq!(Direction::Input.complement().complement(), Direction::Input);
    }

    #[test]
    fn display_and_parse_round_trip() {
        for d in [Direction::Input, Direction::Output] {
            let s = d.to_string();
            assert_eq!(s.parse::<Direction>().unwrap(), d);
        }
    }
}
