//! GitLab group membership client (REST v4).
//!
//! Member listings read `/members/all` so inherited members count as present,
//! and `/members` to tell which of them are direct. Only direct members can be
//! removed from a group.
//! The SAML identity (`group_saml_identity.extern_uid`) is the federated id;
//! GitLab only reports it on the group that owns the SAML link.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use psync_core::{AccessLevel, AccountId, DownstreamAccount};

use crate::http::{next_page, read_json, HttpClient};
use crate::{AccessGateway, AccessGroup, GatewayError};

const PER_PAGE: &str = "100";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitLabGroupRecord {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub full_path: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabMemberRecord {
    pub id: u64,
    pub username: String,
    pub access_level: u32,
    #[serde(default)]
    pub group_saml_identity: Option<SamlIdentity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SamlIdentity {
    #[serde(default)]
    pub extern_uid: Option<String>,
}

/// Blocking client for GitLab group membership.
#[derive(Debug, Clone)]
pub struct GitLabAccess {
    http: HttpClient,
    api: String,
    token: String,
}

impl GitLabAccess {
    pub fn new(base_url: &str, token: &str, timeout: Duration, max_retries: u32) -> Self {
        Self {
            http: HttpClient::new(timeout, max_retries),
            api: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.to_owned(),
        }
    }

    fn get(&self, url: &str) -> ureq::Request {
        self.http
            .agent()
            .get(url)
            .set("PRIVATE-TOKEN", &self.token)
            .set("Accept", "application/json")
    }

    /// Collect every page of a list endpoint, following `X-Next-Page`.
    fn get_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, GatewayError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            debug!("fetching page {page} of {url}");
            let mut request = self
                .get(url)
                .query("per_page", PER_PAGE)
                .query("page", &page_str);
            for (key, value) in query {
                request = request.query(key, value);
            }
            let response = self.http.call(request, None)?;
            let next = next_page(response.header("x-next-page"));
            let batch: Vec<T> = read_json(response)?;
            items.extend(batch);
            match next {
                Some(n) if n > page => page = n,
                _ => return Ok(items),
            }
        }
    }

    fn find_group(&self, name: &str) -> Result<GitLabGroupRecord, GatewayError> {
        let url = format!("{}/groups", self.api);
        let groups: Vec<GitLabGroupRecord> = self.get_pages(&url, &[("search", name)])?;
        select_group(name, &groups).cloned()
    }
}

impl AccessGateway for GitLabAccess {
    fn fetch_group_members(&self, name: &str) -> Result<AccessGroup, GatewayError> {
        let group = self.find_group(name)?;
        let all: Vec<GitLabMemberRecord> =
            self.get_pages(&format!("{}/groups/{}/members/all", self.api, group.id), &[])?;
        let direct: Vec<GitLabMemberRecord> =
            self.get_pages(&format!("{}/groups/{}/members", self.api, group.id), &[])?;
        let access_group = build_access_group(group, all, &direct);
        debug!(
            group = %access_group.name,
            members = access_group.members.len(),
            inherited = access_group.inherited.len(),
            "loaded access group"
        );
        Ok(access_group)
    }

    fn add_member(
        &self,
        group_id: u64,
        account: AccountId,
        level: AccessLevel,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/groups/{group_id}/members", self.api);
        let body = json!({ "user_id": account.0, "access_level": level.value() });
        let request = self
            .http
            .agent()
            .post(&url)
            .set("PRIVATE-TOKEN", &self.token);
        self.http.call(request, Some(&body))?;
        info!(group_id, account = %account, level = %level, "added member");
        Ok(())
    }

    fn remove_member(&self, group_id: u64, account: AccountId) -> Result<(), GatewayError> {
        let url = format!("{}/groups/{group_id}/members/{account}", self.api);
        let request = self
            .http
            .agent()
            .delete(&url)
            .set("PRIVATE-TOKEN", &self.token);
        self.http.call(request, None)?;
        info!(group_id, account = %account, "removed member");
        Ok(())
    }
}

/// Pick the group named `name` out of a fuzzy search result.
///
/// An exact `full_path` match wins; otherwise exactly one `path` or `name`
/// match is required. Comparison ignores ASCII case.
pub(crate) fn select_group<'a>(
    name: &str,
    groups: &'a [GitLabGroupRecord],
) -> Result<&'a GitLabGroupRecord, GatewayError> {
    if let Some(g) = groups
        .iter()
        .find(|g| g.full_path.eq_ignore_ascii_case(name))
    {
        return Ok(g);
    }
    let matches: Vec<&GitLabGroupRecord> = groups
        .iter()
        .filter(|g| g.path.eq_ignore_ascii_case(name) || g.name.eq_ignore_ascii_case(name))
        .collect();
    match matches.as_slice() {
        [] => Err(GatewayError::GroupNotFound(name.to_owned())),
        [only] => Ok(only),
        many => Err(GatewayError::AmbiguousGroup {
            name: name.to_owned(),
            candidates: many.iter().map(|g| g.full_path.clone()).collect(),
        }),
    }
}

/// Map `/members/all` records to accounts; anything not in `direct` is
/// inherited from a parent group.
pub(crate) fn build_access_group(
    group: GitLabGroupRecord,
    all: Vec<GitLabMemberRecord>,
    direct: &[GitLabMemberRecord],
) -> AccessGroup {
    let direct_ids: BTreeSet<u64> = direct.iter().map(|m| m.id).collect();
    let inherited = all
        .iter()
        .filter(|m| !direct_ids.contains(&m.id))
        .map(|m| AccountId(m.id))
        .collect();
    AccessGroup {
        id: group.id,
        name: if group.full_path.is_empty() {
            group.name
        } else {
            group.full_path
        },
        members: to_accounts(all),
        inherited,
    }
}

/// Domain accounts for member records; unknown access levels are skipped.
pub(crate) fn to_accounts(records: Vec<GitLabMemberRecord>) -> Vec<DownstreamAccount> {
    records
        .into_iter()
        .filter_map(|m| {
            let Some(level) = AccessLevel::from_value(m.access_level) else {
                debug!(
                    member = %m.username,
                    level = m.access_level,
                    "unknown access level; skipping"
                );
                return None;
            };
            let extern_uid = m
                .group_saml_identity
                .as_ref()
                .and_then(|s| s.extern_uid.as_deref());
            Some(DownstreamAccount::new(m.id, m.username, extern_uid, level))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use psync_core::FederatedId;
    use rstest::rstest;

    use super::*;

    fn group(id: u64, name: &str, path: &str, full_path: &str) -> GitLabGroupRecord {
        GitLabGroupRecord {
            id,
            name: name.into(),
            path: path.into(),
            full_path: full_path.into(),
        }
    }

    #[rstest]
    #[case("payments", 2)]
    #[case("PAYMENTS", 2)]
    #[case("acme/payments", 2)]
    #[case("Payments Legacy", 3)]
    fn select_group_prefers_exact_matches(#[case] query: &str, #[case] expected: u64) {
        let groups = vec![
            group(1, "payments-old", "payments-old", "acme/payments-old"),
            group(2, "payments", "payments", "acme/payments"),
            group(3, "Payments Legacy", "payments-legacy", "acme/payments-legacy"),
        ];
        assert_eq!(select_group(query, &groups).expect("match").id, expected);
    }

    #[test]
    fn select_group_reports_missing_and_ambiguous() {
        let groups = vec![
            group(1, "search", "search", "acme/search"),
            group(2, "search", "search", "other/search"),
        ];
        assert!(matches!(
            select_group("billing", &groups),
            Err(GatewayError::GroupNotFound(_))
        ));
        let err = select_group("search", &groups).unwrap_err();
        assert!(err.to_string().contains("acme/search"), "got: {err}");
        assert!(select_group("other/search", &groups).is_ok());
    }

    #[test]
    fn members_map_levels_and_saml_identity() {
        let json = r#"[
            {"id":1,"username":"dev","access_level":30,"group_saml_identity":{"extern_uid":"00u1","provider":"group_saml","saml_provider_id":7}},
            {"id":2,"username":"owner","access_level":50,"group_saml_identity":{"extern_uid":"00u2","provider":"group_saml","saml_provider_id":7}},
            {"id":3,"username":"bot","access_level":40,"group_saml_identity":null},
            {"id":4,"username":"plain","access_level":20},
            {"id":5,"username":"odd","access_level":33}
        ]"#;
        let records: Vec<GitLabMemberRecord> = serde_json::from_str(json).expect("decode");
        let members = to_accounts(records);

        let ids: Vec<u64> = members.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(members[0].federated_id, Some(FederatedId::from("00u1")));
        assert_eq!(members[0].access_level, AccessLevel::Developer);
        assert_eq!(members[1].access_level, AccessLevel::Owner);
        assert_eq!(members[2].federated_id, None);
        assert_eq!(members[3].access_level, AccessLevel::Reporter);
    }

    #[test]
    fn members_missing_from_the_direct_listing_are_inherited() {
        let all = r#"[
            {"id":1,"username":"direct","access_level":30},
            {"id":2,"username":"from-parent","access_level":30},
            {"id":3,"username":"owner","access_level":50}
        ]"#;
        let direct = r#"[
            {"id":1,"username":"direct","access_level":30},
            {"id":3,"username":"owner","access_level":50}
        ]"#;
        let all: Vec<GitLabMemberRecord> = serde_json::from_str(all).expect("decode");
        let direct: Vec<GitLabMemberRecord> = serde_json::from_str(direct).expect("decode");

        let access = build_access_group(group(9, "search", "search", "acme/search"), all, &direct);
        assert_eq!(access.id, 9);
        assert_eq!(access.name, "acme/search");
        assert_eq!(access.members.len(), 3);
        assert_eq!(access.inherited.iter().copied().collect::<Vec<_>>(), vec![AccountId(2)]);
    }

    /// Serve canned search pages on a loopback port, one response per
    /// connection, choosing the body by the `page` query parameter.
    fn serve_pages(pages: Vec<(&'static str, &'static str)>) -> String {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        std::thread::spawn(move || {
            for stream in listener.incoming().take(pages.len()) {
                let mut stream = stream.expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone"));
                let mut request_line = String::new();
                reader.read_line(&mut request_line).expect("request line");
                let mut header = String::new();
                while reader.read_line(&mut header).expect("header") > 2 {
                    header.clear();
                }
                let target = request_line.split(' ').nth(1).unwrap_or_default();
                let query = target.split_once('?').map(|(_, q)| q).unwrap_or_default();
                let requested = query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("page="))
                    .expect("page parameter");
                let index = pages
                    .iter()
                    .position(|(page, _)| *page == requested)
                    .expect("known page");
                let body = pages[index].1;
                let next = pages.get(index + 1).map(|(page, _)| *page).unwrap_or("");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     X-Next-Page: {next}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).expect("write");
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn group_search_reads_every_page() {
        let base = serve_pages(vec![
            (
                "1",
                r#"[{"id":1,"name":"search-old","path":"search-old","full_path":"acme/search-old"}]"#,
            ),
            (
                "2",
                r#"[{"id":2,"name":"search","path":"search","full_path":"acme/search"}]"#,
            ),
        ]);
        let access = GitLabAccess::new(&base, "token", Duration::from_secs(5), 0);
        let group = access.find_group("search").expect("found on page 2");
        assert_eq!(group.id, 2);
    }
}
