//! Metadata store: typed document collections persisted as JSON files.
//!
//! Each collection is held in memory behind an `RwLock` and written back to
//! `{dir}/{collection}.json` on mutation; events append to a JSONL log.
//! The on-disk shape is a plain array of documents so a different backend can
//! be swapped in without touching callers — the render pipeline only relies
//! on get / find / insert-if-absent semantics.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::model::{
    Brand, CreativeVariant, Dealer, DealerSlip, Event, EventKind, RenderedAsset, ShareLink,
    SlipDesign, SlipSelection, SlipTemplate,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct MetadataStore {
    dir: PathBuf,
    brands: RwLock<HashMap<String, Brand>>,
    variants: RwLock<HashMap<String, CreativeVariant>>,
    templates: RwLock<HashMap<String, SlipTemplate>>,
    dealer_slips: RwLock<HashMap<String, DealerSlip>>,
    slip_designs: RwLock<HashMap<String, SlipDesign>>,
    dealers: RwLock<HashMap<String, Dealer>>,
    /// Keyed by fingerprint (`hash_key`) — the content-addressed cache.
    rendered: RwLock<HashMap<String, RenderedAsset>>,
    /// Keyed by token.
    share_links: RwLock<HashMap<String, ShareLink>>,
    events: RwLock<Vec<Event>>,
}

impl MetadataStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            brands: RwLock::new(load_keyed(&dir, "brands", |b: &Brand| b.id.clone())?),
            variants: RwLock::new(load_keyed(&dir, "creative_variants", |v: &CreativeVariant| {
                v.id.clone()
            })?),
            templates: RwLock::new(load_keyed(&dir, "slip_templates", |t: &SlipTemplate| {
                t.id.clone()
            })?),
            dealer_slips: RwLock::new(load_keyed(&dir, "dealer_slips", |s: &DealerSlip| {
                s.id.clone()
            })?),
            slip_designs: RwLock::new(load_keyed(&dir, "slip_designs", |s: &SlipDesign| {
                s.id.clone()
            })?),
            dealers: RwLock::new(load_keyed(&dir, "dealers", |d: &Dealer| d.id.clone())?),
            rendered: RwLock::new(load_keyed(&dir, "rendered_assets", |a: &RenderedAsset| {
                a.hash_key.clone()
            })?),
            share_links: RwLock::new(load_keyed(&dir, "share_links", |l: &ShareLink| {
                l.token.clone()
            })?),
            events: RwLock::new(load_events(&dir)?),
            dir,
        })
    }

    // ---- lookups ----------------------------------------------------------

    pub fn brand(&self, id: &str) -> Option<Brand> {
        self.brands.read().get(id).cloned()
    }

    pub fn variant(&self, id: &str) -> Option<CreativeVariant> {
        self.variants.read().get(id).cloned()
    }

    pub fn template(&self, id: &str) -> Option<SlipTemplate> {
        self.templates.read().get(id).cloned()
    }

    pub fn dealer_slip(&self, id: &str) -> Option<DealerSlip> {
        self.dealer_slips.read().get(id).cloned()
    }

    pub fn slip_design(&self, id: &str) -> Option<SlipDesign> {
        self.slip_designs.read().get(id).cloned()
    }

    pub fn dealer(&self, id: &str) -> Option<Dealer> {
        self.dealers.read().get(id).cloned()
    }

    pub fn rendered_by_fingerprint(&self, hash_key: &str) -> Option<RenderedAsset> {
        self.rendered.read().get(hash_key).cloned()
    }

    pub fn rendered_by_id(&self, id: &str) -> Option<RenderedAsset> {
        self.rendered.read().values().find(|a| a.id == id).cloned()
    }

    pub fn share_link(&self, token: &str) -> Option<ShareLink> {
        self.share_links.read().get(token).cloned()
    }

    pub fn has_brands(&self) -> bool {
        !self.brands.read().is_empty()
    }

    // ---- upserts (admin/seed surface) -------------------------------------

    pub fn put_brand(&self, brand: Brand) -> Result<(), StoreError> {
        let mut map = self.brands.write();
        map.insert(brand.id.clone(), brand);
        persist(&self.dir, "brands", &*map)
    }

    pub fn put_variant(&self, variant: CreativeVariant) -> Result<(), StoreError> {
        let mut map = self.variants.write();
        map.insert(variant.id.clone(), variant);
        persist(&self.dir, "creative_variants", &*map)
    }

    pub fn put_template(&self, template: SlipTemplate) -> Result<(), StoreError> {
        let mut map = self.templates.write();
        map.insert(template.id.clone(), template);
        persist(&self.dir, "slip_templates", &*map)
    }

    pub fn put_dealer_slip(&self, slip: DealerSlip) -> Result<(), StoreError> {
        let mut map = self.dealer_slips.write();
        map.insert(slip.id.clone(), slip);
        persist(&self.dir, "dealer_slips", &*map)
    }

    pub fn put_slip_design(&self, design: SlipDesign) -> Result<(), StoreError> {
        let mut map = self.slip_designs.write();
        map.insert(design.id.clone(), design);
        persist(&self.dir, "slip_designs", &*map)
    }

    pub fn put_dealer(&self, dealer: Dealer) -> Result<(), StoreError> {
        let mut map = self.dealers.write();
        map.insert(dealer.id.clone(), dealer);
        persist(&self.dir, "dealers", &*map)
    }

    // ---- render cache -----------------------------------------------------

    /// Conditional insert keyed by fingerprint. When a record already exists
    /// the stored one wins and `inserted` is false — a concurrent writer that
    /// lost the race adopts the winner's asset and discards its own output.
    pub fn insert_rendered_if_absent(
        &self,
        asset: RenderedAsset,
    ) -> Result<(RenderedAsset, bool), StoreError> {
        let mut map = self.rendered.write();
        if let Some(existing) = map.get(&asset.hash_key) {
            return Ok((existing.clone(), false));
        }
        map.insert(asset.hash_key.clone(), asset.clone());
        persist(&self.dir, "rendered_assets", &*map)?;
        Ok((asset, true))
    }

    // ---- state transitions ------------------------------------------------

    /// Review a dealer slip; returns the updated record, `None` if unknown.
    pub fn review_dealer_slip(
        &self,
        slip_id: &str,
        approve: bool,
        reviewer: &str,
    ) -> Result<Option<DealerSlip>, StoreError> {
        let mut map = self.dealer_slips.write();
        let Some(slip) = map.get_mut(slip_id) else {
            return Ok(None);
        };
        slip.review(approve, reviewer);
        let updated = slip.clone();
        persist(&self.dir, "dealer_slips", &*map)?;
        Ok(Some(updated))
    }

    /// Set a dealer's default slip for one brand.
    pub fn set_default_slip(
        &self,
        dealer_id: &str,
        brand_id: &str,
        selection: SlipSelection,
    ) -> Result<Option<Dealer>, StoreError> {
        let mut map = self.dealers.write();
        let Some(dealer) = map.get_mut(dealer_id) else {
            return Ok(None);
        };
        dealer.default_slips.insert(brand_id.to_string(), selection);
        let updated = dealer.clone();
        persist(&self.dir, "dealers", &*map)?;
        Ok(Some(updated))
    }

    // ---- share links ------------------------------------------------------

    pub fn insert_share_link(&self, link: ShareLink) -> Result<(), StoreError> {
        let mut map = self.share_links.write();
        map.insert(link.token.clone(), link);
        persist(&self.dir, "share_links", &*map)
    }

    pub fn record_share_click(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        let mut map = self.share_links.write();
        let Some(link) = map.get_mut(token) else {
            return Ok(None);
        };
        link.clicks += 1;
        let updated = link.clone();
        persist(&self.dir, "share_links", &*map)?;
        Ok(Some(updated))
    }

    // ---- events -----------------------------------------------------------

    pub fn append_event(&self, event: Event) -> Result<(), StoreError> {
        let line = serde_json::to_string(&event)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("events.jsonl"))?;
        writeln!(file, "{line}")?;
        self.events.write().push(event);
        Ok(())
    }

    pub fn count_events(&self, kind: EventKind) -> usize {
        self.events.read().iter().filter(|e| e.kind == kind).count()
    }
}

fn collection_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

fn load_keyed<T, F>(dir: &Path, name: &str, key: F) -> Result<HashMap<String, T>, StoreError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> String,
{
    let path = collection_path(dir, name);
    let text = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    let docs: Vec<T> = serde_json::from_str(&text)?;
    Ok(docs.into_iter().map(|d| (key(&d), d)).collect())
}

fn load_events(dir: &Path) -> Result<Vec<Event>, StoreError> {
    let path = dir.join("events.jsonl");
    let text = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut events = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

fn persist<T: Serialize>(dir: &Path, name: &str, map: &HashMap<String, T>) -> Result<(), StoreError> {
    let docs: Vec<&T> = map.values().collect();
    let text = serde_json::to_string_pretty(&docs)?;
    fs::write(collection_path(dir, name), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApprovalStatus, SlipKind, SlipMode};
    use crate::util;

    fn asset(fp: &str) -> RenderedAsset {
        RenderedAsset {
            id: util::new_id(),
            brand_id: "b1".into(),
            dealer_id: "d1".into(),
            creative_variant_id: "v1".into(),
            slip_mode: SlipMode::Template,
            slip_template_id: Some("t1".into()),
            dealer_slip_id: None,
            slip_design_id: None,
            output_url: "/files/rendered/x.png".into(),
            hash_key: fp.into(),
            created_at: util::now_iso(),
        }
    }

    #[test]
    fn insert_if_absent_keeps_first_writer() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();

        let first = asset("fp-1");
        let (winner, inserted) = store.insert_rendered_if_absent(first.clone()).unwrap();
        assert!(inserted);
        assert_eq!(winner.id, first.id);

        let loser = asset("fp-1");
        let (adopted, inserted) = store.insert_rendered_if_absent(loser).unwrap();
        assert!(!inserted);
        assert_eq!(adopted.id, first.id);
    }

    #[test]
    fn collections_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = MetadataStore::open(dir.path()).unwrap();
            store.insert_rendered_if_absent(asset("fp-persisted")).unwrap();
            store
                .append_event(Event::new(
                    EventKind::RenderGenerated,
                    "b1",
                    Some("d1"),
                    None,
                    serde_json::json!({}),
                ))
                .unwrap();
        }
        let reopened = MetadataStore::open(dir.path()).unwrap();
        assert!(reopened.rendered_by_fingerprint("fp-persisted").is_some());
        assert_eq!(reopened.count_events(EventKind::RenderGenerated), 1);
    }

    #[test]
    fn review_transition_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        store
            .put_dealer_slip(DealerSlip {
                id: "s1".into(),
                dealer_id: "d1".into(),
                brand_id: "b1".into(),
                file_url: "/files/slips/s.png".into(),
                name: "Festive".into(),
                status: ApprovalStatus::Pending,
                reviewed_by: None,
                created_at: util::now_iso(),
            })
            .unwrap();

        let slip = store.review_dealer_slip("s1", true, "Partner A").unwrap().unwrap();
        assert_eq!(slip.status, ApprovalStatus::Approved);
        assert_eq!(slip.reviewed_by.as_deref(), Some("Partner A"));
        assert!(store.review_dealer_slip("missing", true, "x").unwrap().is_none());
    }

    #[test]
    fn share_clicks_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        store
            .insert_share_link(ShareLink {
                id: util::new_id(),
                token: "tok".into(),
                asset_id: "a1".into(),
                brand_id: "b1".into(),
                dealer_id: "d1".into(),
                clicks: 0,
                created_at: util::now_iso(),
            })
            .unwrap();

        store.record_share_click("tok").unwrap();
        let link = store.record_share_click("tok").unwrap().unwrap();
        assert_eq!(link.clicks, 2);
        assert!(store.record_share_click("nope").unwrap().is_none());
    }

    #[test]
    fn default_slip_selection_is_per_brand() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        store
            .put_dealer(Dealer {
                id: "d1".into(),
                name: "Kumar Electronics".into(),
                owner_name: "Raj Kumar".into(),
                phone: "+919876543212".into(),
                whatsapp: None,
                address: "Shop 12, Main Market".into(),
                pincode: "110001".into(),
                district: "Central Delhi".into(),
                state: "Delhi".into(),
                logo_url: None,
                brand_links: vec![],
                default_slips: Default::default(),
                created_at: util::now_iso(),
            })
            .unwrap();

        let dealer = store
            .set_default_slip(
                "d1",
                "b1",
                SlipSelection { slip_type: SlipKind::Uploaded, slip_id: "s1".into() },
            )
            .unwrap()
            .unwrap();
        assert_eq!(dealer.default_slips.get("b1").unwrap().slip_id, "s1");
    }
}
