//! ignore 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 파일은 실행되지 않는 선언형 데이터입니다. 파일 하나가 실행 전체의
//! [`IgnoreRuleSet`]이 되며, 항목 하나라도 잘못되면 로딩 전체가 실패합니다.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ReconPipelineError;

use super::types::{IgnoreSpecFile, NetworkMatcher};
use super::{IgnoreRuleSet, RuleTable};

/// 규칙 파일 최대 크기
const MAX_IGNORE_SPEC_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 두 테이블을 합친 최대 매처 수
const MAX_MATCHERS_COUNT: usize = 100_000;

/// ignore 규칙 파일 로더
pub struct IgnoreSpecLoader;

impl IgnoreSpecLoader {
    /// 단일 YAML 파일에서 규칙 집합을 로드합니다.
    ///
    /// # Errors
    /// - 파일이 없거나 읽을 수 없는 경우
    /// - 파일 크기가 10MB를 초과하는 경우
    /// - YAML 파싱 또는 항목 검증에 실패한 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<IgnoreRuleSet, ReconPipelineError> {
        let path = path.as_ref();

        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| ReconPipelineError::IgnoreSpec {
                    path: path.display().to_string(),
                    reason: format!("failed to read file metadata: {e}"),
                })?;

        if metadata.len() > MAX_IGNORE_SPEC_SIZE {
            return Err(ReconPipelineError::IgnoreSpec {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_IGNORE_SPEC_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ReconPipelineError::IgnoreSpec {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let rules = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            ignore_nets = rules.ignore_nets().matcher_count(),
            never_ignore = rules.never_ignore().matcher_count(),
            "loaded ignore spec"
        );

        Ok(rules)
    }

    /// YAML 문자열을 파싱하여 규칙 집합을 생성합니다.
    ///
    /// 비어 있거나 주석만 있는 문서는 빈 규칙 집합입니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<IgnoreRuleSet, ReconPipelineError> {
        let is_blank = yaml_str
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if is_blank {
            return Ok(IgnoreRuleSet::empty());
        }

        let spec: IgnoreSpecFile =
            serde_yaml::from_str(yaml_str).map_err(|e| ReconPipelineError::IgnoreSpec {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        Self::build(spec, source)
    }

    /// 역직렬화된 규칙 파일을 검증하여 규칙 집합으로 변환합니다.
    pub fn build(spec: IgnoreSpecFile, source: &str) -> Result<IgnoreRuleSet, ReconPipelineError> {
        let total: usize = spec
            .ignorenets
            .values()
            .chain(spec.neverignore.values())
            .map(Vec::len)
            .sum();
        if total > MAX_MATCHERS_COUNT {
            return Err(ReconPipelineError::IgnoreSpec {
                path: source.to_owned(),
                reason: format!("too many network entries: {total} (max: {MAX_MATCHERS_COUNT})"),
            });
        }

        let ignore_nets = build_table("ignorenets", spec.ignorenets)?;
        let never_ignore = build_table("neverignore", spec.neverignore)?;
        Ok(IgnoreRuleSet::new(ignore_nets, never_ignore))
    }
}

fn build_table(
    table: &str,
    entries: impl IntoIterator<Item = (String, Vec<String>)>,
) -> Result<RuleTable, ReconPipelineError> {
    let mut by_sensor = HashMap::new();

    for (sensor, nets) in entries {
        if sensor.trim().is_empty() {
            return Err(ReconPipelineError::IgnoreRule {
                table: table.to_owned(),
                sensor,
                entry: String::new(),
                reason: "sensor name must not be empty".to_owned(),
            });
        }

        let mut matchers = Vec::with_capacity(nets.len());
        for entry in nets {
            let matcher = entry.parse::<NetworkMatcher>().map_err(|reason| {
                ReconPipelineError::IgnoreRule {
                    table: table.to_owned(),
                    sensor: sensor.clone(),
                    entry: entry.clone(),
                    reason,
                }
            })?;
            matchers.push(matcher);
        }
        by_sensor.insert(sensor, matchers);
    }

    Ok(RuleTable::from_map(by_sensor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn parse_valid_yaml() {
        let yaml = r#"
ignorenets:
  s1:
    - 10.0.0.0/8
    - 192.0.2.10-192.0.2.20
neverignore:
  s1:
    - 10.1.0.0/16
"#;
        let rules = IgnoreSpecLoader::parse_yaml(yaml, "ignore.yml").unwrap();
        assert!(rules.ignore_nets().matches("s1", addr("10.2.3.4")));
        assert!(rules.ignore_nets().matches("s1", addr("192.0.2.15")));
        assert!(rules.never_ignore().matches("s1", addr("10.1.2.3")));
        assert!(!rules.ignore_nets().matches("s2", addr("10.2.3.4")));
    }

    #[test]
    fn empty_or_comment_only_yields_empty_set() {
        for doc in ["", "   \n", "# nothing to ignore\n\n# yet\n"] {
            let rules = IgnoreSpecLoader::parse_yaml(doc, "empty.yml").unwrap();
            assert!(rules.is_empty());
        }
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let result = IgnoreSpecLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yml");
        assert!(matches!(
            result,
            Err(ReconPipelineError::IgnoreSpec { .. })
        ));
    }

    #[test]
    fn invalid_entry_names_table_sensor_and_entry() {
        let yaml = "neverignore:\n  s1:\n    - 10.0.0.0/40\n";
        let err = IgnoreSpecLoader::parse_yaml(yaml, "bad.yml").unwrap_err();
        match err {
            ReconPipelineError::IgnoreRule {
                table,
                sensor,
                entry,
                ..
            } => {
                assert_eq!(table, "neverignore");
                assert_eq!(sensor, "s1");
                assert_eq!(entry, "10.0.0.0/40");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_sensor_name_is_rejected() {
        let yaml = "ignorenets:\n  \"\":\n    - 10.0.0.0/8\n";
        let result = IgnoreSpecLoader::parse_yaml(yaml, "bad.yml");
        assert!(matches!(
            result,
            Err(ReconPipelineError::IgnoreRule { .. })
        ));
    }

    #[test]
    fn too_many_entries_is_rejected() {
        let mut spec = IgnoreSpecFile::default();
        spec.ignorenets.insert(
            "s1".to_owned(),
            vec!["10.0.0.1".to_owned(); MAX_MATCHERS_COUNT + 1],
        );
        let result = IgnoreSpecLoader::build(spec, "huge.yml");
        assert!(matches!(
            result,
            Err(ReconPipelineError::IgnoreSpec { .. })
        ));
    }

    #[tokio::test]
    async fn load_nonexistent_file_returns_error() {
        let result = IgnoreSpecLoader::load_file("/nonexistent/path/ignore.yml").await;
        assert!(matches!(
            result,
            Err(ReconPipelineError::IgnoreSpec { .. })
        ));
    }

    #[tokio::test]
    async fn load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignore.yml");
        tokio::fs::write(&path, "IGNORENETS:\n  s1: [\"10.0.0.0/8\"]\n")
            .await
            .unwrap();

        let rules = IgnoreSpecLoader::load_file(&path).await.unwrap();
        assert!(rules.ignore_nets().matches("s1", addr("10.9.9.9")));
        assert!(!rules.never_ignore().matches("s1", addr("10.9.9.9")));
    }
}
