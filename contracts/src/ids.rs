use chrono::Utc;
use uuid::Uuid;

/// Prefix used when minting an entity id, mirroring the original store's
/// `{prefix}-{timestamp}-{8 hex}` scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Episode,
    Pattern,
    Skill,
    AntiPattern,
    Task,
    ConsensusRound,
    Fault,
}

impl IdPrefix {
    fn as_str(self) -> &'static str {
        match self {
            IdPrefix::Episode => "ep",
            IdPrefix::Pattern => "pat",
            IdPrefix::Skill => "skill",
            IdPrefix::AntiPattern => "anti",
            IdPrefix::Task => "task",
            IdPrefix::ConsensusRound => "round",
            IdPrefix::Fault => "fault",
        }
    }
}

/// Generates an id of the form `{prefix}-{YYYYMMDDHHMMSS}-{8 hex chars}`.
pub fn generate_id(prefix: IdPrefix) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix.as_str(), timestamp, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_expected_shape() {
        let id = generate_id(IdPrefix::Episode);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ep");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn ids_are_unique() {
        let a = generate_id(IdPrefix::Pattern);
        let b = generate_id(IdPrefix::Pattern);
        assert_ne!(a, b);
    }
}
