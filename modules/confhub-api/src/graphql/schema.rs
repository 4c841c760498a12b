use async_graphql::{Context, EmptySubscription, Object, Result, Schema};

use confhub_common::{ConferenceFilter, Dictionary};
use confhub_store::DynStore;

use super::loaders::{CachedLoader, ConferenceByIdLoader};
use super::mutations::MutationRoot;
use super::types::{
    ConferenceFilterInput, GqlConference, GqlConferenceList, GqlDictionaryEntry, GqlPagination,
    PagerInput,
};

pub type ApiSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn conference(&self, ctx: &Context<'_>, id: i64) -> Result<Option<GqlConference>> {
        let loader = ctx.data_unchecked::<CachedLoader<ConferenceByIdLoader>>();
        Ok(loader.load_one(id).await?.map(GqlConference))
    }

    /// One page of conferences plus the total count over the same filters.
    async fn conference_list(
        &self,
        ctx: &Context<'_>,
        pager: PagerInput,
        filters: Option<ConferenceFilterInput>,
    ) -> Result<GqlConferenceList> {
        let store = ctx.data_unchecked::<DynStore>();
        let pager = pager.clamped();
        let filter = filters.map(ConferenceFilter::from).unwrap_or_default();

        let (values, total_count) = tokio::join!(
            store.conference_page(&pager, &filter),
            store.conference_count(&filter),
        );

        Ok(GqlConferenceList {
            values: values?.into_iter().map(GqlConference).collect(),
            pagination: GqlPagination {
                page: pager.page,
                page_size: pager.page_size,
                total_count: total_count?,
            },
        })
    }

    async fn category_list(&self, ctx: &Context<'_>) -> Result<Vec<GqlDictionaryEntry>> {
        dictionary_list(ctx, Dictionary::Category).await
    }

    async fn type_list(&self, ctx: &Context<'_>) -> Result<Vec<GqlDictionaryEntry>> {
        dictionary_list(ctx, Dictionary::ConferenceType).await
    }

    async fn country_list(&self, ctx: &Context<'_>) -> Result<Vec<GqlDictionaryEntry>> {
        dictionary_list(ctx, Dictionary::Country).await
    }

    async fn county_list(&self, ctx: &Context<'_>) -> Result<Vec<GqlDictionaryEntry>> {
        dictionary_list(ctx, Dictionary::County).await
    }

    async fn city_list(&self, ctx: &Context<'_>) -> Result<Vec<GqlDictionaryEntry>> {
        dictionary_list(ctx, Dictionary::City).await
    }
}

async fn dictionary_list(
    ctx: &Context<'_>,
    dict: Dictionary,
) -> Result<Vec<GqlDictionaryEntry>> {
    let store = ctx.data_unchecked::<DynStore>();
    Ok(store
        .dictionary_list(dict)
        .await?
        .into_iter()
        .map(GqlDictionaryEntry::from)
        .collect())
}

/// Build the schema. The store is schema data; loaders are attached
/// per-request in [`super::context::request_scope`].
pub fn build_schema(store: DynStore) -> ApiSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}
