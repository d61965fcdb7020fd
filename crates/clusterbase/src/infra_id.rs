//! Infra ID generation

use crate::manager::Manager;
use clusterbase_cloud::{ClusterDocument, Result};
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

pub const INFRA_ID_MAX_LEN: usize = 27;
pub const INFRA_ID_RANDOM_LEN: usize = 5;

/// Alphabet without vowels or easily confused characters
const ALPHANUMS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9-]").expect("valid regex"));
static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new("-{2,}").expect("valid regex"));

/// Identifier of at most `max_len` characters: the sanitized `base`, a
/// hyphen, then `random_len` random characters.
///
/// Only `[A-Za-z0-9-]` survive sanitization, runs of hyphens collapse to
/// one, and the base never ends in a hyphen. When `max_len` leaves no room
/// for the hyphen, the result is just `max_len` random characters.
pub fn generate_infra_id(base: &str, max_len: usize, random_len: usize) -> String {
    if max_len <= random_len {
        return random_string(max_len);
    }
    let max_base_len = max_len - random_len - 1;

    let base = INVALID_CHARS.replace_all(base, "-");
    let mut base = HYPHEN_RUNS.replace_all(&base, "-").into_owned();

    // sanitized text is ASCII, so byte truncation is safe
    base.truncate(max_base_len);
    let base = base.trim_end_matches('-');

    format!("{}-{}", base, random_string(random_len))
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHANUMS[rng.gen_range(0..ALPHANUMS.len())] as char)
        .collect()
}

impl Manager {
    /// Assign the infra ID once; later calls leave it untouched
    pub async fn ensure_infra_id(&mut self) -> Result<()> {
        if !self.cluster().properties.infra_id.is_empty() {
            tracing::debug!(infra_id = %self.cluster().properties.infra_id, "Infra ID already set");
            return Ok(());
        }

        let infra_id = generate_infra_id(
            &self.cluster().name.to_lowercase(),
            INFRA_ID_MAX_LEN,
            INFRA_ID_RANDOM_LEN,
        );
        tracing::info!(infra_id = %infra_id, "Generated infra ID");

        self.patch(&|doc: &mut ClusterDocument| {
            if doc.cluster.properties.infra_id.is_empty() {
                doc.cluster.properties.infra_id = infra_id.clone();
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestHarness, cluster};
    use proptest::prelude::*;

    fn assert_well_formed(id: &str, max_len: usize, random_len: usize) {
        assert!(id.len() <= max_len, "{} longer than {}", id, max_len);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(!id.contains("--"), "{} has a hyphen run", id);

        let (base, suffix) = id.split_at(id.len() - random_len);
        assert!(base.ends_with('-'));
        assert!(!base[..base.len() - 1].ends_with('-'));
        assert!(suffix.bytes().all(|b| ALPHANUMS.contains(&b)));
    }

    #[test]
    fn test_sanitizes_and_appends_suffix() {
        let id = generate_infra_id("my cluster!!", 27, 5);
        assert!(id.starts_with("my-cluster-"));
        assert_eq!(id.len(), 16);
        assert_well_formed(&id, 27, 5);
    }

    #[test]
    fn test_truncates_long_base() {
        let id = generate_infra_id("abcdefghijklmnopqrstuvwxyz0123456789", 27, 5);
        assert_eq!(&id[..21], "abcdefghijklmnopqrstu");
        assert_eq!(id.len(), 27);
        assert_well_formed(&id, 27, 5);
    }

    #[test]
    fn test_truncation_does_not_leave_trailing_hyphen() {
        // position 20 of the sanitized base is a hyphen
        let id = generate_infra_id("aaaaaaaaaaaaaaaaaaaa_bbbbbb", 27, 5);
        assert!(id.starts_with("aaaaaaaaaaaaaaaaaaaa-"));
        assert_eq!(id.len(), 26);
        assert_well_formed(&id, 27, 5);
    }

    #[test]
    fn test_various_inputs_are_well_formed() {
        for base in [
            "",
            "-",
            "a--b",
            "--leading",
            "ünïcødé-cluster",
            "UPPER.case_and.dots",
            "x",
            "________________________________",
        ] {
            let id = generate_infra_id(base, 27, 5);
            assert_well_formed(&id, 27, 5);
        }
    }

    proptest! {
        #[test]
        fn test_any_input_is_well_formed(
            base in any::<String>(),
            random_len in 0usize..12,
            extra in 1usize..40,
        ) {
            let max_len = random_len + extra;
            let id = generate_infra_id(&base, max_len, random_len);
            assert_well_formed(&id, max_len, random_len);
        }

        #[test]
        fn test_default_lengths_are_well_formed(base in any::<String>()) {
            let id = generate_infra_id(&base, INFRA_ID_MAX_LEN, INFRA_ID_RANDOM_LEN);
            assert_well_formed(&id, INFRA_ID_MAX_LEN, INFRA_ID_RANDOM_LEN);
        }
    }

    #[test]
    fn test_short_max_len_is_respected() {
        for (max_len, random_len) in [(0, 5), (3, 5), (5, 5), (6, 5)] {
            let id = generate_infra_id("cluster", max_len, random_len);
            assert!(id.len() <= max_len, "{} longer than {}", id, max_len);
        }
        let id = generate_infra_id("cluster", 4, 5);
        assert_eq!(id.len(), 4);
        assert!(id.bytes().all(|b| ALPHANUMS.contains(&b)));
        assert_eq!(generate_infra_id("cluster", 6, 5).len(), 6);
    }

    #[test]
    fn test_suffixes_vary() {
        let ids: std::collections::HashSet<String> =
            (0..20).map(|_| generate_infra_id("cluster", 27, 5)).collect();
        assert!(ids.len() > 1);
    }

    #[tokio::test]
    async fn test_ensure_infra_id_is_write_once() {
        let mut unset = cluster();
        unset.name = "My Cluster".to_string();
        unset.properties.infra_id.clear();
        let harness = TestHarness::new(unset).await;
        let mut manager = harness.manager();

        manager.ensure_infra_id().await.unwrap();
        let first = manager.cluster().properties.infra_id.clone();
        assert!(first.starts_with("my-cluster-"));

        manager.ensure_infra_id().await.unwrap();
        assert_eq!(manager.cluster().properties.infra_id, first);

        let stored = harness.stored().await;
        assert_eq!(stored.cluster.properties.infra_id, first);
    }
}
