use chrono::Utc;
use rand::RngCore;

/// Generates a GUID-shaped, time-ordered identifier: the top 32 bits are a
/// UTC unix timestamp, the bottom 96 bits are random. Unique with
/// overwhelming probability across concurrent callers; no UUID version or
/// variant bits are set.
pub fn time_ordered_id() -> String {
    let unix = Utc::now().timestamp() as u32;

    let mut b = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut b);

    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:04x}{:08x}",
        unix,
        u16::from_be_bytes([b[0], b[1]]),
        u16::from_be_bytes([b[2], b[3]]),
        u16::from_be_bytes([b[4], b[5]]),
        u16::from_be_bytes([b[6], b[7]]),
        u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_is_guid_shaped() {
        let id = time_ordered_id();
        assert_eq!(id.len(), 36);
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(groups.len(), 5);
        assert_eq!(groups[0].len(), 8);
        assert_eq!(groups[1].len(), 4);
        assert_eq!(groups[2].len(), 4);
        assert_eq!(groups[3].len(), 4);
        assert_eq!(groups[4].len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    #[test]
    fn id_starts_with_current_timestamp() {
        let before = Utc::now().timestamp() as u32;
        let id = time_ordered_id();
        let after = Utc::now().timestamp() as u32;

        let stamp = u32::from_str_radix(&id[..8], 16).unwrap();
        assert!(stamp >= before);
        assert!(stamp <= after);
    }

    #[test]
    fn ids_generated_in_succession_are_distinct() {
        let ids: HashSet<String> = (0..1000).map(|_| time_ordered_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
