//! Share transcoding.
//!
//! A share is a pipeline rewritten in portable terms: channel ids (which are
//! private to an owner) become channel actions, credentials are stripped,
//! and the set of actions the share needs is recorded as a manifest. The
//! reverse direction, [`instantiate`], rebinds a share onto another owner's
//! channels.

use chrono::Utc;
use futures_util::future::join;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::jobs::{record_best_effort, ActivityEvent, ActivityLog};
use crate::resolver::{ChannelDirectory, ChannelResolver, Resolution};
use crate::store::{self, Collection, DocumentStore, Filter, PageRequest, Sort};
use crate::template::Template;
use crate::types::{
    normalize_key, AccountContext, BipType, ChannelId, Hub, HubNode, Manifest, Pipeline, PipelineShare,
    SharedHub, SourceKey,
};
use crate::SOURCE_KEY;

/// Entity name used in replies and not-found errors.
pub const SHARE_ENTITY: &str = "bip_share";

const BIP_ENTITY: &str = "bip";

/// Usage counter bumped on every new share.
pub const SHARE_COUNTER: &str = "share_total";

/// Collects the manifest while channel ids are translated.
struct Translator<'a> {
    resolver: &'a ChannelResolver,
    manifest: Manifest,
}

impl<'a> Translator<'a> {
    fn new(resolver: &'a ChannelResolver) -> Self {
        Self {
            resolver,
            manifest: Manifest::new(),
        }
    }

    fn channel(&mut self, id: &ChannelId) -> Option<String> {
        let action = self.resolver.action(id)?;
        self.manifest.insert(action);
        Some(action.to_string())
    }

    fn key(&mut self, key: &SourceKey) -> Option<String> {
        match self.resolver.resolve(key) {
            Resolution::Source => Some(SOURCE_KEY.to_string()),
            Resolution::Action(action) => {
                self.manifest.insert(action);
                Some(action.to_string())
            }
            Resolution::Miss => None,
        }
    }
}

/// Rewrite a pipeline into its portable form.
///
/// Unresolvable hub keys, edges and transform targets are dropped;
/// unresolvable references inside templates are left as written. Two
/// channels sharing an action collapse into one hub entry whose edges and
/// transforms are merged. `created`/`updated` are left at zero.
pub fn transcode(pipeline: &Pipeline, resolver: &ChannelResolver, account: &AccountContext) -> PipelineShare {
    let mut t = Translator::new(resolver);
    let mut hub = SharedHub::new();

    for (key, node) in pipeline.hub.iter() {
        let Some(source) = t.key(key) else {
            continue;
        };
        let entry = hub.entry(normalize_key(&source)).or_default();

        for edge in &node.edges {
            if let Some(action) = t.channel(edge) {
                entry.edges.push(action);
            }
        }

        for (target, imports) in &node.transforms {
            let Some(target_action) = t.channel(target) else {
                continue;
            };
            let transforms = entry.transforms.entry(normalize_key(&target_action)).or_default();
            for (import, template) in imports {
                let rendered = Template::parse(template).render(|id| t.channel(id));
                transforms.insert(import.clone(), rendered);
            }
        }
    }

    let mut config = pipeline.config.clone();
    match pipeline.bip_type {
        BipType::Http => {
            config.insert("auth".to_string(), Value::from("token"));
            config.remove("username");
            config.remove("password");
        }
        BipType::Trigger => {
            if let Some(channel_id) = pipeline.config_channel_id() {
                match t.channel(&channel_id) {
                    Some(action) => {
                        config.insert("channel_id".to_string(), Value::from(action));
                    }
                    None => {
                        config.remove("channel_id");
                    }
                }
            }
        }
        _ => {}
    }

    if let Some(miss) = resolver.dangling(&pipeline.hub) {
        tracing::debug!(
            bip_id = %pipeline.id,
            owner_id = %pipeline.owner_id,
            error = %miss,
            "Dropped unresolved channel references from share"
        );
    }

    let manifest = t.manifest;
    PipelineShare {
        id: None,
        bip_id: pipeline.id.clone(),
        owner_id: pipeline.owner_id.clone(),
        owner_name: account.owner_name.clone(),
        bip_type: pipeline.bip_type.clone(),
        name: pipeline.name.clone(),
        note: pipeline.note.clone(),
        icon: pipeline.icon.clone(),
        config,
        hub,
        manifest_hash: manifest.hash(),
        manifest,
        created: 0,
        updated: 0,
    }
}

/// A share rebound onto an owner's channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    /// The rebuilt pipeline, unpaused, with a fresh impression count.
    pub pipeline: Pipeline,
    /// Manifest actions the owner has no channel for.
    pub missing: BTreeSet<String>,
}

impl Instantiation {
    /// Whether every action of the share found a channel.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Rebind a share onto `resolver`'s owner as pipeline `bip_id`.
///
/// Each action picks the owner's first channel bound to it. Hub parts
/// naming an action without a channel are dropped and the action reported
/// in [`Instantiation::missing`]; templates keep such actions as written.
pub fn instantiate(share: &PipelineShare, resolver: &ChannelResolver, bip_id: impl Into<String>) -> Instantiation {
    let bind = |action: &str| -> Option<ChannelId> { resolver.channel_for_action(action).cloned() };

    let missing: BTreeSet<String> = share
        .manifest
        .iter()
        .filter(|action| bind(*action).is_none())
        .map(str::to_string)
        .collect();

    let mut hub = Hub::new();
    for (key, shared) in &share.hub {
        let source = if key == SOURCE_KEY {
            SourceKey::Source
        } else {
            match bind(key) {
                Some(id) => SourceKey::Channel(id),
                None => continue,
            }
        };

        let edges = shared.edges.iter().filter_map(|action| bind(action)).collect();
        let mut transforms = BTreeMap::new();
        for (target, imports) in &shared.transforms {
            let Some(target_id) = bind(target) else {
                continue;
            };
            let rebound = imports
                .iter()
                .map(|(import, template)| (import.clone(), Template::parse_shared(template).rebind(bind)))
                .collect();
            transforms.insert(target_id, rebound);
        }
        hub.insert(source, HubNode { edges, transforms });
    }

    let mut pipeline = Pipeline::new(bip_id, resolver.owner_id(), share.bip_type.clone()).with_hub(hub);
    pipeline.name = share.name.clone();
    pipeline.note = share.note.clone();
    pipeline.icon = share.icon.clone();
    pipeline.config = share.config.clone();

    if share.bip_type == BipType::Trigger {
        let action = pipeline.config.get("channel_id").and_then(Value::as_str).map(str::to_string);
        if let Some(action) = action {
            match bind(&action) {
                Some(id) => {
                    pipeline.config.insert("channel_id".to_string(), Value::from(id.as_str()));
                }
                None => {
                    pipeline.config.remove("channel_id");
                }
            }
        }
    }

    Instantiation { pipeline, missing }
}

/// Sort order for share listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareOrder {
    /// Newest first.
    #[default]
    Recent,
    /// By name, ascending.
    Name,
}

impl ShareOrder {
    /// Parse an order name; anything but `"name"` means [`ShareOrder::Recent`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "name" => Self::Name,
            _ => Self::Recent,
        }
    }

    fn sort(&self) -> Sort {
        match self {
            Self::Recent => Sort::desc("created"),
            Self::Name => Sort::asc("name"),
        }
    }
}

/// Share listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareQuery {
    /// Page number, 1-based. Defaults to 1.
    pub page: Option<u64>,
    /// Page size. Defaults to the configured share page size.
    pub page_size: Option<u64>,
    /// Sort order.
    pub order: ShareOrder,
    /// `"<field>:<terms>"` search; terms match `note` case-insensitively.
    pub list_by: Option<String>,
}

impl ShareQuery {
    fn search_terms(&self) -> Option<&str> {
        let list_by = self.list_by.as_deref()?;
        let terms = match list_by.split_once(':') {
            Some((_, terms)) => terms,
            None => list_by,
        };
        let terms = terms.trim();
        (!terms.is_empty()).then_some(terms)
    }
}

/// One page of shares.
#[derive(Debug, Clone, PartialEq)]
pub struct SharePage {
    /// Shares matching the query, across pages.
    pub total: u64,
    /// Page number returned.
    pub page: u64,
    /// Page size used.
    pub page_size: u64,
    /// Shares on this page.
    pub shares: Vec<PipelineShare>,
}

/// Publishes, withdraws and lists pipeline shares.
pub struct ShareTranscoder<S: DocumentStore, D: ChannelDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    activity: Arc<dyn ActivityLog>,
    page_size: u64,
}

impl<S, D> ShareTranscoder<S, D>
where
    S: DocumentStore + 'static,
    D: ChannelDirectory + 'static,
{
    /// Create a transcoder.
    pub fn new(store: Arc<S>, directory: Arc<D>, activity: Arc<dyn ActivityLog>, config: &KernelConfig) -> Self {
        Self {
            store,
            directory,
            activity,
            page_size: config.share_page_size.max(1),
        }
    }

    /// Share (or re-share) a pipeline owned by `account`.
    ///
    /// Sharing the same pipeline again replaces the stored share in place
    /// and keeps its id and creation time.
    pub async fn share(&self, pipeline: &Pipeline, account: &AccountContext) -> Result<PipelineShare, KernelError> {
        if pipeline.owner_id != account.owner_id {
            return Err(KernelError::not_found(BIP_ENTITY, pipeline.id.clone()));
        }

        let resolver = ChannelResolver::load(self.directory.as_ref(), &account.owner_id).await?;
        let mut share = transcode(pipeline, &resolver, account);
        let now = Utc::now().timestamp();

        let key = Filter::eq("owner_id", account.owner_id.as_str()).and(Filter::eq("bip_id", pipeline.id.as_str()));
        let existing: Option<PipelineShare> = store::find_one(self.store.as_ref(), Collection::BipShare, &key).await?;

        match existing {
            Some(previous) => {
                share.id = previous.id;
                share.created = previous.created;
                share.updated = now;

                let mut patch = serde_json::to_value(&share)?;
                if let Some(fields) = patch.as_object_mut() {
                    fields.remove("id");
                }
                self.store
                    .update_by_filter(Collection::BipShare, &key, patch)
                    .await
                    .map_err(KernelError::from_store)?;

                tracing::info!(
                    owner_id = %account.owner_id,
                    bip_id = %pipeline.id,
                    manifest_hash = %share.manifest_hash,
                    "Updated share"
                );
            }
            None => {
                share.created = now;
                share.updated = now;

                let id = self
                    .store
                    .insert(Collection::BipShare, serde_json::to_value(&share)?)
                    .await
                    .map_err(KernelError::from_store)?;
                share.id = Some(id);

                tracing::info!(
                    owner_id = %account.owner_id,
                    bip_id = %pipeline.id,
                    actions = share.manifest.len(),
                    "Created share"
                );

                join(
                    record_best_effort(
                        self.activity.as_ref(),
                        ActivityEvent::BipShare {
                            owner_id: account.owner_id.clone(),
                            bip_id: pipeline.id.clone(),
                        },
                    ),
                    record_best_effort(
                        self.activity.as_ref(),
                        ActivityEvent::UsageCounter {
                            owner_id: account.owner_id.clone(),
                            counter: SHARE_COUNTER.to_string(),
                        },
                    ),
                )
                .await;
            }
        }

        Ok(share)
    }

    /// Remove one of `account`'s shares.
    pub async fn unshare(&self, share_id: &str, account: &AccountContext) -> Result<(), KernelError> {
        let filter = Filter::eq("owner_id", account.owner_id.as_str()).and(Filter::eq("id", share_id));

        let share: PipelineShare = store::find_one(self.store.as_ref(), Collection::BipShare, &filter)
            .await?
            .ok_or_else(|| KernelError::not_found(SHARE_ENTITY, share_id))?;

        self.store
            .remove_by_filter(Collection::BipShare, &filter)
            .await
            .map_err(KernelError::from_store)?;

        tracing::info!(owner_id = %account.owner_id, share_id, bip_id = %share.bip_id, "Removed share");

        record_best_effort(
            self.activity.as_ref(),
            ActivityEvent::BipUnshare {
                owner_id: share.owner_id,
                bip_id: share.bip_id,
            },
        )
        .await;

        Ok(())
    }

    /// One page of shares, across all owners.
    pub async fn list_shares(&self, query: &ShareQuery) -> Result<SharePage, KernelError> {
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = query.page_size.filter(|s| *s > 0).unwrap_or(self.page_size);

        let filter = match query.search_terms() {
            Some(terms) => Filter::contains_insensitive("note", terms),
            None => Filter::all(),
        };
        let request = PageRequest {
            page,
            page_size,
            sort: query.order.sort(),
        };

        let found = self
            .store
            .find_page(Collection::BipShare, &filter, &request)
            .await
            .map_err(KernelError::from_store)?;

        let shares = found
            .documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PipelineShare>, _>>()?;

        Ok(SharePage {
            total: found.total,
            page,
            page_size,
            shares,
        })
    }
}
