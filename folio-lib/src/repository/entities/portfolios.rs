use tracing::{debug, warn};

use crate::{
    Error, Notice, Result, ValidationError,
    repository::{
        config::Cfg,
        entities::{DeleteOutcome, image::inline_jpeg},
        models::{ALL_CATEGORIES, ImagePayload, PortfolioFields, PortfolioItem},
        remote::{Client, Request, Response},
        session::SessionHandle,
    },
};

/// A portfolio item being written or edited, before it is sent to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub category: String,
    pub title: String,
    pub description: String,
    pub image: ImagePayload,
}

impl Draft {
    /// Check the draft and return it with whitespace around the title and description removed.
    ///
    /// The category is kept exactly as chosen. [`ALL_CATEGORIES`] only exists for filtering, so
    /// it is refused like a missing one.
    fn validated(&self) -> Result<Self> {
        let category = self.category.as_str();
        let title = self.title.trim();
        let description = self.description.trim();

        if category.trim().is_empty() || category == ALL_CATEGORIES {
            return Err(ValidationError::MissingCategory.into());
        }
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription.into());
        }

        Ok(Self {
            category: category.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            image: self.image.clone(),
        })
    }

    fn into_fields(self, student_name: String) -> PortfolioFields {
        PortfolioFields {
            student_name,
            category: self.category,
            title: self.title,
            description: self.description,
            image: self.image,
        }
    }
}

/// Editing an item starts from what it holds now, image included.
impl From<&PortfolioItem> for Draft {
    fn from(item: &PortfolioItem) -> Self {
        Self {
            category: item.category.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            image: item.image.clone(),
        }
    }
}

/// The logged in student's portfolio, cached locally.
///
/// The cache only ever holds items owned by the student it was loaded for, newest first. It is
/// replaced wholesale by [`Portfolios::load`], which runs again after every successful write.
/// Writes check ids against a cache loaded for the student logged in at that moment.
#[derive(Debug, Clone)]
pub struct Portfolios {
    client: Client,
    session: SessionHandle,
    cfg: Cfg,
    items: Vec<PortfolioItem>,
    loaded_for: Option<String>,
}

impl Portfolios {
    pub(crate) fn new(client: Client, session: SessionHandle, cfg: Cfg) -> Self {
        Self {
            client,
            session,
            cfg,
            items: Vec::new(),
            loaded_for: None,
        }
    }

    pub fn items(&self) -> &[PortfolioItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&PortfolioItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Items of the given category in cache order. [`ALL_CATEGORIES`] matches everything.
    pub fn filter(&self, category: &str) -> Vec<&PortfolioItem> {
        self.items
            .iter()
            .filter(|item| category == ALL_CATEGORIES || item.category == category)
            .collect()
    }

    /// Replace the cache with the items owned by `owner`.
    ///
    /// Whatever the store sends back is filtered by owner again here. If the store can't be read
    /// the cache ends up empty.
    pub async fn load(&mut self, owner: &str) -> &[PortfolioItem] {
        let limit = self.cfg.read().remote.page_limit;

        self.items = match self
            .client
            .call(Request::ListPortfolios {
                student_name: owner.to_string(),
                limit,
            })
            .await
            .and_then(Response::into_portfolios)
        {
            Ok(items) => owned_newest_first(items, owner),
            Err(e) => {
                warn!("Could not load portfolio of '{owner}': {e}");
                Vec::new()
            }
        };

        self.loaded_for = Some(owner.to_string());
        debug!("Loaded {} portfolio items of '{owner}'", self.items.len());

        &self.items
    }

    /// [`Portfolios::load`] for the logged in student.
    pub async fn refresh(&mut self) -> Result<&[PortfolioItem]> {
        let owner = self.owner()?;
        Ok(self.load(&owner).await)
    }

    /// Create a new item, or replace every field of the item `edit_id`.
    pub async fn save(&mut self, draft: &Draft, edit_id: Option<&str>) -> Result<Notice> {
        let draft = draft.validated()?;
        let owner = self.owner()?;
        let fields = draft.into_fields(owner.clone());

        let (request, notice) = match edit_id {
            Some(id) => {
                self.ensure_cached(&owner, id).await?;
                (
                    Request::UpdatePortfolio {
                        id: id.to_string(),
                        fields,
                    },
                    Notice::PortfolioUpdated,
                )
            }
            None => (Request::CreatePortfolio(fields), Notice::PortfolioCreated),
        };

        self.client.call(request).await?.into_done()?;
        self.load(&owner).await;

        Ok(notice)
    }

    /// Delete the item `id` once `confirm` agrees to it.
    pub async fn delete(
        &mut self,
        id: &str,
        confirm: impl FnOnce(&PortfolioItem) -> bool,
    ) -> Result<DeleteOutcome> {
        let owner = self.owner()?;
        let item = self.ensure_cached(&owner, id).await?;

        if !confirm(item) {
            debug!("Deletion of portfolio item '{id}' declined");
            return Ok(DeleteOutcome::Declined);
        }

        self.client
            .call(Request::DeletePortfolio { id: id.to_string() })
            .await?
            .into_done()?;
        self.load(&owner).await;

        Ok(DeleteOutcome::Deleted)
    }

    /// Turn an uploaded image file into the payload stored with an item.
    ///
    /// The image is shrunk and re-encoded locally. With hosted images enabled it is then
    /// uploaded and the item keeps the URL the store hands back.
    pub async fn prepare_image(&self, bytes: &[u8]) -> Result<ImagePayload> {
        let data_uri = inline_jpeg(bytes)?;

        if !self.cfg.read().images.hosted {
            return Ok(ImagePayload::Inline(data_uri));
        }

        let student_name = self.owner()?;
        let url = self
            .client
            .call(Request::UploadImage {
                student_name,
                data_uri,
            })
            .await?
            .into_image_url()?;

        Ok(ImagePayload::Hosted(url))
    }

    fn owner(&self) -> Result<String> {
        self.session
            .read()
            .current_user()
            .map(str::to_string)
            .ok_or(Error::NotLoggedIn)
    }

    /// The cached item `id` of `owner`. The cache is reloaded first if it belongs to someone else.
    async fn ensure_cached(&mut self, owner: &str, id: &str) -> Result<&PortfolioItem> {
        if self.loaded_for.as_deref() != Some(owner) {
            debug!("Portfolio cache is not for '{owner}', reloading");
            self.load(owner).await;
        }

        self.get(id).ok_or_else(|| Error::UnknownItem(id.to_string()))
    }
}

/// Keep the items of `owner`, newest first. Items without a timestamp go last, in store order.
fn owned_newest_first(items: Vec<PortfolioItem>, owner: &str) -> Vec<PortfolioItem> {
    let mut owned: Vec<_> = items
        .into_iter()
        .filter(|item| item.student_name == owner)
        .collect();

    // `None` sorts below any `Some`, so reversing the comparison puts missing timestamps last
    owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    owned
}
