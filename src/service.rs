//! Service layer API for tender and bid operations
use std::sync::Arc;

use crate::bid::{Bid, BidEdit, BidStatus, BidView, NewBid};
use crate::config::MarketConfig;
use crate::directory::{ResponsibilityDirectory, SledDirectory};
use crate::error::{MarketError, MarketResult, StorageResultExt};
use crate::guard::MutationGuard;
use crate::projection::Projection;
use crate::record::LiveRecord;
use crate::repository::VersionedRepository;
use crate::review::{ReviewStore, ReviewView};
use crate::status::parse_status;
use crate::tender::{NewTender, Tender, TenderEdit, TenderStatus, TenderView};

/// Window over a listing. `limit: None` uses the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

pub struct Marketplace<D = SledDirectory> {
    instance: Arc<sled::Db>,
    config: MarketConfig,
    guard: MutationGuard<D>,
    tenders: VersionedRepository<Tender>,
    bids: VersionedRepository<Bid>,
    reviews: ReviewStore,
}

impl Marketplace<SledDirectory> {
    /// Opens the database described by `config`, keeping the directory in it too.
    pub fn open(config: MarketConfig) -> MarketResult<Self> {
        let instance = Arc::new(config.open_db()?);
        let directory = SledDirectory::open(&instance)?;
        Self::with_db(instance, config, directory)
    }
}

impl<D: ResponsibilityDirectory> Marketplace<D> {
    pub fn with_db(instance: Arc<sled::Db>, config: MarketConfig, directory: D) -> MarketResult<Self> {
        Ok(Self {
            tenders: VersionedRepository::open(&instance)?,
            bids: VersionedRepository::open(&instance)?,
            reviews: ReviewStore::open(&instance)?,
            guard: MutationGuard::new(directory),
            instance,
            config,
        })
    }

    pub fn directory(&self) -> &D {
        self.guard.directory()
    }

    pub fn tenders(&self) -> &VersionedRepository<Tender> {
        &self.tenders
    }

    pub fn bids(&self) -> &VersionedRepository<Bid> {
        &self.bids
    }

    pub fn flush(&self) -> MarketResult<()> {
        self.instance.flush().storage("flush")?;
        Ok(())
    }

    /// Publish a new tender draft at version 1
    #[tracing::instrument(skip_all, fields(organization_id = %request.organization_id, actor = %request.creator_username))]
    pub fn create_tender(&self, request: NewTender) -> MarketResult<TenderView> {
        let (live, _) = self.tenders.create(
            &self.guard,
            &request.creator_username,
            &request.organization_id,
            request.content(),
        )?;
        Ok(Tender::latest(&live))
    }

    #[tracing::instrument(skip(self, edit))]
    pub fn edit_tender(&self, id: &str, username: &str, edit: &TenderEdit) -> MarketResult<TenderView> {
        let live = self
            .tenders
            .edit(&self.guard, id, username, edit, self.config.edit_mode)?;
        Ok(Tender::latest(&live))
    }

    #[tracing::instrument(skip(self))]
    pub fn update_tender_status(&self, id: &str, username: &str, status: &str) -> MarketResult<TenderView> {
        let status: TenderStatus = parse_status(status)?;
        let live = self.tenders.set_status(&self.guard, id, username, status)?;
        Ok(Tender::latest(&live))
    }

    /// Current status, subject to the visibility rule for non-published tenders
    pub fn tender_status(&self, id: &str, username: &str) -> MarketResult<TenderStatus> {
        let actor = self.guard.resolve(username)?;
        let live = self.tenders.get(id)?;
        self.guard
            .authorize_read(&actor, &live.organization_id, live.status)?;
        Ok(live.status)
    }

    #[tracing::instrument(skip(self))]
    pub fn rollback_tender(&self, id: &str, version: u32, username: &str) -> MarketResult<TenderView> {
        let live = self.tenders.rollback(&self.guard, id, version, username)?;
        Ok(Tender::latest(&live))
    }

    /// Full history of one tender, newest first
    pub fn tender_versions(&self, id: &str, username: &str) -> MarketResult<Vec<TenderView>> {
        history(&self.guard, &self.tenders, id, username)
    }

    /// Every version of every tender `username` created, tenders ordered by name
    pub fn my_tenders(&self, username: &str, page: Page) -> MarketResult<Vec<TenderView>> {
        let actor = self.guard.resolve(username)?;
        let mine = self
            .tenders
            .scan()?
            .into_iter()
            .filter(|live| live.creator_username == actor.username)
            .collect();
        let mine = paged(by_name(mine, |c| &c.name), page, self.config.tender_page_limit);

        let mut views = Vec::new();
        for live in &mine {
            let versions = self.tenders.list_versions(&live.id)?;
            views.extend(Tender::history(live, &versions));
        }
        Ok(views)
    }

    /// Public listing of published tenders, optionally narrowed to some service types
    pub fn published_tenders(&self, service_types: &[String], page: Page) -> MarketResult<Vec<TenderView>> {
        let published = self
            .tenders
            .scan()?
            .into_iter()
            .filter(|live| live.status == TenderStatus::Published)
            .filter(|live| {
                service_types.is_empty() || service_types.contains(&live.content.service_type)
            })
            .collect();
        let published = paged(by_name(published, |c| &c.name), page, self.config.tender_page_limit);
        Ok(published.iter().map(Tender::latest).collect())
    }

    /// Submit a bid against a published tender
    #[tracing::instrument(skip_all, fields(tender_id = %request.tender_id, actor = %request.creator_username))]
    pub fn create_bid(&self, request: NewBid) -> MarketResult<BidView> {
        let tender = self.tenders.get(&request.tender_id)?;
        if tender.status != TenderStatus::Published {
            return Err(MarketError::ValidationFailed(format!(
                "tender `{}` is {} and does not accept bids",
                tender.id, tender.status
            )));
        }
        let (live, _) = self.bids.create(
            &self.guard,
            &request.creator_username,
            &request.organization_id,
            request.content(),
        )?;
        Ok(Bid::latest(&live))
    }

    #[tracing::instrument(skip(self, edit))]
    pub fn edit_bid(&self, id: &str, username: &str, edit: &BidEdit) -> MarketResult<BidView> {
        let live = self
            .bids
            .edit(&self.guard, id, username, edit, self.config.edit_mode)?;
        Ok(Bid::latest(&live))
    }

    #[tracing::instrument(skip(self))]
    pub fn update_bid_status(&self, id: &str, username: &str, status: &str) -> MarketResult<BidView> {
        let status: BidStatus = parse_status(status)?;
        let live = self.bids.set_status(&self.guard, id, username, status)?;
        Ok(Bid::latest(&live))
    }

    pub fn bid_status(&self, id: &str, username: &str) -> MarketResult<BidStatus> {
        let actor = self.guard.resolve(username)?;
        let live = self.bids.get(id)?;
        self.guard
            .authorize_read(&actor, &live.organization_id, live.status)?;
        Ok(live.status)
    }

    #[tracing::instrument(skip(self))]
    pub fn rollback_bid(&self, id: &str, version: u32, username: &str) -> MarketResult<BidView> {
        let live = self.bids.rollback(&self.guard, id, version, username)?;
        Ok(Bid::latest(&live))
    }

    pub fn bid_versions(&self, id: &str, username: &str) -> MarketResult<Vec<BidView>> {
        history(&self.guard, &self.bids, id, username)
    }

    /// Latest state of every bid `username` created
    pub fn my_bids(&self, username: &str, page: Page) -> MarketResult<Vec<BidView>> {
        let actor = self.guard.resolve(username)?;
        let mine = self
            .bids
            .scan()?
            .into_iter()
            .filter(|live| live.creator_username == actor.username)
            .collect();
        let mine = paged(by_name(mine, |c| &c.name), page, self.config.bid_page_limit);
        Ok(mine.iter().map(Bid::latest).collect())
    }

    /// Bids on `tender_id` that `username` may see
    pub fn bids_for_tender(&self, tender_id: &str, username: &str, page: Page) -> MarketResult<Vec<BidView>> {
        let actor = self.guard.resolve(username)?;
        let tender = self.tenders.get(tender_id)?;
        let owns_tender = self.guard.is_responsible(&actor, &tender.organization_id)?;

        let mut visible = Vec::new();
        for live in self.bids.scan()? {
            if live.content.tender_id != tender.id {
                continue;
            }
            let published = live.status == BidStatus::Published;
            if (owns_tender && published) || self.guard.is_responsible(&actor, &live.organization_id)? {
                visible.push(live);
            }
        }
        let visible = paged(by_name(visible, |c| &c.name), page, self.config.bid_page_limit);
        Ok(visible.iter().map(Bid::latest).collect())
    }

    /// Review a bid on behalf of the organization that owns its tender
    #[tracing::instrument(skip(self, comment))]
    pub fn submit_review(&self, bid_id: &str, username: &str, rating: u8, comment: &str) -> MarketResult<ReviewView> {
        let bid = self.bids.get(bid_id)?;
        let tender = self.tenders.get(&bid.content.tender_id)?;
        let actor = self.guard.authorize(username, &tender.organization_id)?;
        let review = self
            .reviews
            .append(&bid.id, &actor.username, &tender.organization_id, rating, comment)?;
        Ok(review.into())
    }

    /// Reviews of a bid, readable by either side of the deal
    pub fn bid_reviews(&self, bid_id: &str, username: &str) -> MarketResult<Vec<ReviewView>> {
        let bid = self.bids.get(bid_id)?;
        let tender = self.tenders.get(&bid.content.tender_id)?;
        let actor = self.guard.resolve(username)?;
        if !self.guard.is_responsible(&actor, &tender.organization_id)? {
            self.guard.check(&actor, &bid.organization_id)?;
        }
        Ok(self
            .reviews
            .for_bid(&bid.id)?
            .into_iter()
            .map(ReviewView::from)
            .collect())
    }
}

// history of one entity for an actor responsible for its organization
fn history<K, D>(
    guard: &MutationGuard<D>,
    repository: &VersionedRepository<K>,
    id: &str,
    username: &str,
) -> MarketResult<Vec<K::View>>
where
    K: Projection,
    D: ResponsibilityDirectory,
{
    let live = repository.get(id)?;
    guard.authorize(username, &live.organization_id)?;
    let versions = repository.list_versions(id)?;
    Ok(K::history(&live, &versions))
}

fn by_name<C, S, F>(mut rows: Vec<LiveRecord<C, S>>, name: F) -> Vec<LiveRecord<C, S>>
where
    F: Fn(&C) -> &String,
{
    rows.sort_by(|a, b| name(&a.content).cmp(name(&b.content)).then_with(|| a.id.cmp(&b.id)));
    rows
}

fn paged<T>(rows: Vec<T>, page: Page, default_limit: usize) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset)
        .take(page.limit.unwrap_or(default_limit))
        .collect()
}
