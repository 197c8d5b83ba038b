//! Okta directory client.
//!
//! Groups are found with the `q` prefix search and members are read per group.
//! Every list endpoint pages through the `Link: <…>; rel="next"` header.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use psync_core::{FederatedId, UpstreamGroup, UserStatus};

use crate::http::{next_link, read_json, HttpClient};
use crate::{DirectoryGateway, GatewayError};

const PAGE_LIMIT: &str = "200";

#[derive(Debug, Deserialize)]
pub(crate) struct OktaGroupRecord {
    pub id: String,
    pub profile: OktaGroupProfile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OktaGroupProfile {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OktaUserRecord {
    pub id: String,
    pub status: String,
}

/// Blocking client for the Okta management API.
#[derive(Debug, Clone)]
pub struct OktaDirectory {
    http: HttpClient,
    org_url: String,
    auth: String,
}

impl OktaDirectory {
    pub fn new(org_url: &str, token: &str, timeout: Duration, max_retries: u32) -> Self {
        Self {
            http: HttpClient::new(timeout, max_retries),
            org_url: org_url.trim_end_matches('/').to_owned(),
            auth: format!("SSWS {token}"),
        }
    }

    /// Follow `rel="next"` links starting at `first`, collecting every page.
    fn get_all<T: serde::de::DeserializeOwned>(
        &self,
        first: ureq::Request,
    ) -> Result<Vec<T>, GatewayError> {
        let mut items = Vec::new();
        let mut request = first;
        loop {
            debug!("fetching page: {}", request.url());
            let response = self.http.call(request, None)?;
            let next = next_link(response.header("link"));
            let page: Vec<T> = read_json(response)?;
            items.extend(page);
            match next {
                Some(url) => request = self.request(&url),
                None => return Ok(items),
            }
        }
    }

    fn request(&self, url: &str) -> ureq::Request {
        self.http
            .agent()
            .get(url)
            .set("Authorization", &self.auth)
            .set("Accept", "application/json")
    }

    fn group_members(&self, group_id: &str) -> Result<Vec<OktaUserRecord>, GatewayError> {
        let url = format!("{}/api/v1/groups/{group_id}/users", self.org_url);
        self.get_all(self.request(&url).query("limit", PAGE_LIMIT))
    }
}

impl DirectoryGateway for OktaDirectory {
    fn fetch_groups_by_prefix(&self, prefix: &str) -> Result<Vec<UpstreamGroup>, GatewayError> {
        let url = format!("{}/api/v1/groups", self.org_url);
        let records: Vec<OktaGroupRecord> = self.get_all(
            self.request(&url)
                .query("q", prefix)
                .query("limit", PAGE_LIMIT),
        )?;

        let mut groups = Vec::new();
        for record in records {
            let Some(name) = strip_group_prefix(&record.profile.name, prefix) else {
                debug!(group = %record.profile.name, "search hit without prefix; skipping");
                continue;
            };
            let members = self.group_members(&record.id)?;
            let group = to_upstream_group(&record.id, name, members);
            info!(
                group = %group.name,
                active = group.active.len(),
                deprovisioned = group.deprovisioned.len(),
                "loaded directory group"
            );
            groups.push(group);
        }
        Ok(groups)
    }
}

/// Name with `prefix` removed, or `None` when the name does not start with it
/// or nothing remains.
pub(crate) fn strip_group_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

pub(crate) fn to_upstream_group(
    id: &str,
    name: &str,
    members: Vec<OktaUserRecord>,
) -> UpstreamGroup {
    let classified = members.into_iter().filter_map(|user| {
        let status = parse_status(&user.status);
        if status.is_none() {
            warn!(user = %user.id, status = %user.status, "unknown user status; ignoring member");
        }
        Some((FederatedId::parse(&user.id)?, status?))
    });
    UpstreamGroup::partition(id, name, classified)
}

fn parse_status(raw: &str) -> Option<UserStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned())).ok()
}
