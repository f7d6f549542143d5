use rustc_hash::FxHashMap;
use tracing::trace;

use crate::query::{has_key_prefix_constraint, ResolvedQuery, Scope};
use crate::types::{GroupId, TypeId};

use super::adjacency::{covers, mark_dir};

/// Transaction-local record of which relation scopes of one vertex are
/// fully materialized.
///
/// Three tiers of direction bitmasks, consulted broadest first: every type,
/// per group, per type. The group and type maps are allocated on first use
/// since most vertices are only ever fetched one way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadingStatus {
    all_loaded: u8,
    groups: Option<FxHashMap<GroupId, u8>>,
    types: Option<FxHashMap<TypeId, u8>>,
}

impl LoadingStatus {
    /// Creates an empty status: nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an earlier fetch already materialized every relation `query` can return.
    pub fn has_loaded(&self, query: &ResolvedQuery<'_>) -> bool {
        let dir = query.direction();
        if covers(self.all_loaded, dir) {
            return true;
        }
        if let (Some(groups), Some(group)) = (&self.groups, query.group()) {
            if groups.get(&group).is_some_and(|code| covers(*code, dir)) {
                return true;
            }
        }
        if let (Some(types), Scope::Type { ty, .. }) = (&self.types, query.scope()) {
            if types.get(&ty).is_some_and(|code| covers(*code, dir)) {
                return true;
            }
        }
        false
    }

    /// Records that the fetch for `query` completed.
    ///
    /// The narrowest tier that is exhaustively true is updated. A typed fetch
    /// that binds the first key attribute only read a keyed sub-range of the
    /// type and is not recorded at all.
    pub fn mark_loaded(&mut self, query: &ResolvedQuery<'_>) -> &mut Self {
        let dir = query.direction();
        match query.scope() {
            Scope::Type { ty, .. } => {
                if has_key_prefix_constraint(query) {
                    trace!(ty = %ty, dir = %dir, "relcache.loading.keyed_fetch_skipped");
                } else {
                    let types = self.types.get_or_insert_with(FxHashMap::default);
                    let code = types.entry(ty).or_insert(0);
                    *code = mark_dir(*code, dir);
                    trace!(ty = %ty, code = *code, "relcache.loading.type_marked");
                }
            }
            Scope::Group { group } => {
                let groups = self.groups.get_or_insert_with(FxHashMap::default);
                let code = groups.entry(group).or_insert(0);
                *code = mark_dir(*code, dir);
                trace!(group = %group, code = *code, "relcache.loading.group_marked");
            }
            Scope::All => {
                self.all_loaded = mark_dir(self.all_loaded, dir);
                trace!(code = self.all_loaded, "relcache.loading.all_marked");
            }
        }
        self
    }

    /// Direction bitmask of the every-type tier.
    pub fn all_loaded(&self) -> u8 {
        self.all_loaded
    }

    /// Direction bitmask recorded for `group`.
    pub fn group_code(&self, group: GroupId) -> u8 {
        self.groups
            .as_ref()
            .and_then(|g| g.get(&group).copied())
            .unwrap_or(0)
    }

    /// Direction bitmask recorded for `ty`.
    pub fn type_code(&self, ty: TypeId) -> u8 {
        self.types
            .as_ref()
            .and_then(|t| t.get(&ty).copied())
            .unwrap_or(0)
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.all_loaded == 0
            && self.groups.as_ref().map_or(true, |g| g.is_empty())
            && self.types.as_ref().map_or(true, |t| t.is_empty())
    }

    /// Forgets every recorded fetch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
