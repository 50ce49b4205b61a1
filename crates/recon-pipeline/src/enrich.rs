//! 레코드 보강 (`infos`)
//!
//! 쓰기 직전에 레코드로부터 추가 필드를 계산합니다. 보강은 실패하지 않으며,
//! 값을 해석할 수 없으면 빈 맵을 반환합니다.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use sha2::{Digest, Sha256};

use passiverecon_core::types::{FieldMap, FieldValue, PersistableRecord};

/// 레코드 보강기
///
/// 클로저 `Fn(&PersistableRecord) -> FieldMap`도 보강기로 사용할 수 있습니다.
pub trait Enricher {
    /// 레코드의 보강 필드를 계산합니다.
    fn infos(&self, record: &PersistableRecord) -> FieldMap;
}

impl<F> Enricher for F
where
    F: Fn(&PersistableRecord) -> FieldMap,
{
    fn infos(&self, record: &PersistableRecord) -> FieldMap {
        self(record)
    }
}

/// 보강하지 않는 보강기
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInfos;

impl Enricher for NoInfos {
    fn infos(&self, _record: &PersistableRecord) -> FieldMap {
        FieldMap::new()
    }
}

/// recon 타입별 기본 보강기
///
/// | recon 타입 | 조건 | 결과 |
/// |---|---|---|
/// | `DNS_*` | | `domain`: 이름과 모든 상위 도메인 |
/// | `SSL_*` | source가 `cert`로 시작 | `sha256`, `size` (DER) |
/// | `SSH_*HOSTKEY` | | `fingerprint`: `SHA256:<base64>` |
/// | `HTTP_*` | source가 `AUTHORIZATION`, Basic | `username` |
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconInfos;

impl Enricher for ReconInfos {
    fn infos(&self, record: &PersistableRecord) -> FieldMap {
        let value = record.full_value.as_deref().unwrap_or(&record.value);
        let source = record.source.as_deref().unwrap_or_default();
        let recon_type = record.recon_type.as_str();

        let mut infos = FieldMap::new();
        if recon_type.starts_with("DNS_") {
            let domains = domain_chain(value);
            if !domains.is_empty() {
                infos.insert("domain".to_owned(), FieldValue::List(domains));
            }
        } else if recon_type.starts_with("SSL_") && source.starts_with("cert") {
            if let Ok(der) = STANDARD.decode(value.trim()) {
                infos.insert(
                    "sha256".to_owned(),
                    hex::encode(Sha256::digest(&der)).into(),
                );
                infos.insert("size".to_owned(), (der.len() as i64).into());
            }
        } else if recon_type.starts_with("SSH_") && recon_type.ends_with("HOSTKEY") {
            if let Ok(key) = STANDARD.decode(value.trim()) {
                let fingerprint = STANDARD_NO_PAD.encode(Sha256::digest(&key));
                infos.insert(
                    "fingerprint".to_owned(),
                    format!("SHA256:{fingerprint}").into(),
                );
            }
        } else if recon_type.starts_with("HTTP_") && source.eq_ignore_ascii_case("AUTHORIZATION") {
            if let Some(username) = basic_auth_username(value) {
                infos.insert("username".to_owned(), username.into());
            }
        }
        infos
    }
}

/// `www.example.com` -> `[www.example.com, example.com, com]`
fn domain_chain(name: &str) -> Vec<FieldValue> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() {
        return Vec::new();
    }
    let mut out = vec![FieldValue::from(name)];
    let mut rest = name;
    while let Some((_, parent)) = rest.split_once('.') {
        if parent.is_empty() {
            break;
        }
        out.push(FieldValue::from(parent));
        rest = parent;
    }
    out
}

fn basic_auth_username(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(token.trim()).ok()?;
    let decoded = String::from_utf8_lossy(&decoded);
    let (username, _) = decoded.split_once(':')?;
    Some(username.to_owned())
}
