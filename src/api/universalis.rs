use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{get_json, HttpSource};
use crate::config::MarketConfig;
use crate::error::{Error, FetchFailure, Result};
use crate::model::{ItemMarketData, MarketSnapshot, World, WorldSelector};
use crate::progress::Progress;

/// Hard ceiling on ids per request imposed by the market API.
pub const MAX_IDS_PER_REQUEST: usize = 100;

/// Replaced with the chunk's comma-joined ids.
pub const ITEM_IDS_PLACEHOLDER: &str = "{itemIds}";

/// Replaced with "items." for multi-id chunks, nothing for a single id.
/// The API nests multi-id results under `items`, so field projections must follow.
pub const FIELDS_PREFIX_PLACEHOLDER: &str = "{fieldsPrefix}";

/// Multi-id requests come back keyed under `items`. A single id comes back
/// as a bare item object instead.
#[derive(Deserialize)]
struct MultiItemResponse {
    items: HashMap<String, ItemMarketData>,
}

/// Client for the player-market API.
pub struct Universalis<S> {
    source: S,
    base_url: String,
    batch_size: usize,
    listings: u32,
    recent_entries: u32,
    history_entries: Option<u32>,
}

impl<S: HttpSource> Universalis<S> {
    pub fn new(source: S, config: &MarketConfig) -> Self {
        Self {
            source,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.clamp(1, MAX_IDS_PER_REQUEST),
            listings: config.listings,
            recent_entries: config.recent_entries,
            history_entries: config.history_entries,
        }
    }

    /// Issue one request per chunk of ids, strictly in order, and merge
    /// the results. Any failed chunk fails the whole call.
    pub async fn fetch_batched(
        &self,
        ids: &[u32],
        url_template: &str,
        progress: &dyn Progress,
    ) -> Result<MarketSnapshot> {
        let mut snapshot = MarketSnapshot::new();
        let total_batches = ids.len().div_ceil(self.batch_size);

        for (index, chunk) in ids.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            let url = render_url(url_template, chunk);
            debug!(batch, total_batches, ids = chunk.len(), "Fetching market batch");

            let items = self.fetch_chunk(&url, chunk).await.map_err(|source| {
                Error::MarketDataFetch {
                    url: url.clone(),
                    batch,
                    total_batches,
                    first_id: chunk[0],
                    last_id: chunk[chunk.len() - 1],
                    source,
                }
            })?;

            let collisions = snapshot.merge(items);
            if !collisions.is_empty() {
                warn!(?collisions, "Market batch repeated item ids");
            }

            progress.update(batch, total_batches, "Fetching market data");
        }

        Ok(snapshot)
    }

    /// The response shape follows the chunk size, so a body of the wrong
    /// shape is a decode failure rather than an empty result.
    async fn fetch_chunk(
        &self,
        url: &str,
        chunk: &[u32],
    ) -> std::result::Result<HashMap<String, ItemMarketData>, FetchFailure> {
        if let [requested] = chunk {
            let item: ItemMarketData = get_json(&self.source, url).await?;
            if item.item_id != *requested {
                return Err(FetchFailure::UnexpectedItem {
                    requested: *requested,
                    returned: item.item_id,
                });
            }
            return Ok(HashMap::from([(item.item_id.to_string(), item)]));
        }

        let response: MultiItemResponse = get_json(&self.source, url).await?;
        Ok(response.items)
    }

    /// Sales inside `lookback` for each finished item on `world_id`.
    pub async fn sales_history(
        &self,
        ids: &[u32],
        world_id: u32,
        lookback: Duration,
        progress: &dyn Progress,
    ) -> Result<MarketSnapshot> {
        let template = self.sales_history_template(world_id, lookback);
        self.fetch_batched(ids, &template, progress).await
    }

    /// Active listings plus recent sales for each ingredient on `world_id`.
    pub async fn current_listings(
        &self,
        ids: &[u32],
        world_id: u32,
        progress: &dyn Progress,
    ) -> Result<MarketSnapshot> {
        let template = self.current_data_template(world_id);
        self.fetch_batched(ids, &template, progress).await
    }

    /// All worlds known to the market API, sorted by name.
    pub async fn worlds(&self) -> Result<Vec<World>> {
        let url = format!("{}/worlds", self.base_url);

        let mut worlds: Vec<World> = get_json(&self.source, &url)
            .await
            .map_err(|source| Error::MetadataFetch {
                url: url.clone(),
                source,
            })?;
        worlds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(worlds)
    }

    /// Look a configured world up in the world list.
    pub async fn resolve_world(&self, selector: &WorldSelector) -> Result<World> {
        let worlds = self.worlds().await?;
        selector
            .resolve(&worlds)
            .cloned()
            .ok_or_else(|| Error::MetadataFetch {
                url: format!("{}/worlds", self.base_url),
                source: FetchFailure::Lookup(format!("no world matches {:?}", selector)),
            })
    }

    fn sales_history_template(&self, world_id: u32, lookback: Duration) -> String {
        let mut url = format!(
            "{}/history/{}/{}?entriesWithin={}",
            self.base_url,
            world_id,
            ITEM_IDS_PLACEHOLDER,
            lookback.as_secs()
        );
        if let Some(entries) = self.history_entries.filter(|&n| n > 0) {
            url.push_str(&format!("&entriesToReturn={}", entries));
        }
        url
    }

    fn current_data_template(&self, world_id: u32) -> String {
        let fields = [
            "itemID",
            "worldID",
            "listings.pricePerUnit",
            "recentHistory.pricePerUnit",
            "regularSaleVelocity",
        ]
        .iter()
        .map(|f| format!("{}{}", FIELDS_PREFIX_PLACEHOLDER, f))
        .collect::<Vec<_>>()
        .join(",");

        format!(
            "{}/{}/{}?listings={}&entries={}&fields={}",
            self.base_url,
            world_id,
            ITEM_IDS_PLACEHOLDER,
            self.listings,
            self.recent_entries,
            fields
        )
    }
}

#[cfg(test)]
impl<S> Universalis<S> {
    pub(crate) fn source(&self) -> &S {
        &self.source
    }
}

/// Fill the placeholders in a URL template for one chunk.
fn render_url(template: &str, chunk: &[u32]) -> String {
    let ids = chunk
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let prefix = if chunk.len() > 1 { "items." } else { "" };

    template
        .replace(ITEM_IDS_PLACEHOLDER, &ids)
        .replace(FIELDS_PREFIX_PLACEHOLDER, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::ScriptedSource;
    use crate::error::TransportError;
    use crate::progress::tests::RecordingProgress;
    use crate::progress::NoProgress;
    use serde_json::json;

    fn config(batch_size: usize) -> MarketConfig {
        MarketConfig {
            base_url: "https://market.test/api/v2/".to_string(),
            batch_size,
            ..Default::default()
        }
    }

    /// Body for a multi-id response covering `ids`.
    fn many(ids: &[u32]) -> String {
        let items: serde_json::Map<String, serde_json::Value> = ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    json!({ "itemID": id, "entries": [{ "pricePerUnit": id * 10 }] }),
                )
            })
            .collect();
        json!({ "itemIDs": ids, "items": items }).to_string()
    }

    fn ids_in(url: &str) -> Vec<u32> {
        let path = url.split('?').next().unwrap();
        let last = path.rsplit('/').next().unwrap();
        last.split(',').map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_render_url_prefix_follows_chunk_size() {
        let template = "x/{itemIds}?fields={fieldsPrefix}listings";
        assert_eq!(render_url(template, &[1, 2]), "x/1,2?fields=items.listings");
        assert_eq!(render_url(template, &[7]), "x/7?fields=listings");
    }

    #[tokio::test]
    async fn test_fetch_batched_splits_in_order() {
        let ids: Vec<u32> = (1..=250).collect();
        let source = ScriptedSource::new()
            .respond(many(&ids[0..100]))
            .respond(many(&ids[100..200]))
            .respond(many(&ids[200..250]));
        let client = Universalis::new(source, &config(100));
        let progress = RecordingProgress::default();

        let snapshot = client
            .fetch_batched(&ids, "https://m/{itemIds}", &progress)
            .await
            .unwrap();

        let requested = client.source.requested();
        assert_eq!(requested.len(), 3);
        assert_eq!(ids_in(&requested[0]), ids[0..100].to_vec());
        assert_eq!(ids_in(&requested[1]), ids[100..200].to_vec());
        assert_eq!(ids_in(&requested[2]), ids[200..250].to_vec());

        assert_eq!(snapshot.len(), 250);
        assert_eq!(snapshot.get(250).unwrap().sale_prices(), vec![2500]);

        let updates = progress.updates.lock().unwrap();
        let steps: Vec<(usize, usize)> = updates.iter().map(|u| (u.0, u.1)).collect();
        assert_eq!(steps, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_fetch_batched_request_count_is_ceil() {
        for (n, batch, expected) in [(1usize, 3usize, 1usize), (3, 3, 1), (4, 3, 2), (7, 3, 3)] {
            let ids: Vec<u32> = (1..=n as u32).collect();
            let mut source = ScriptedSource::new();
            for chunk in ids.chunks(batch) {
                source = if chunk.len() == 1 {
                    source.respond(json!({ "itemID": chunk[0] }).to_string())
                } else {
                    source.respond(many(chunk))
                };
            }
            let client = Universalis::new(source, &config(batch));

            let snapshot = client
                .fetch_batched(&ids, "m/{itemIds}", &NoProgress)
                .await
                .unwrap();

            assert_eq!(client.source.requested().len(), expected, "n={} b={}", n, batch);
            assert_eq!(snapshot.len(), n);
        }
    }

    #[tokio::test]
    async fn test_fetch_batched_empty_ids_makes_no_requests() {
        let client = Universalis::new(ScriptedSource::new(), &config(100));
        let snapshot = client
            .fetch_batched(&[], "m/{itemIds}", &NoProgress)
            .await
            .unwrap();

        assert!(snapshot.is_empty());
        assert!(client.source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_capped_at_api_limit() {
        let ids: Vec<u32> = (1..=150).collect();
        let source = ScriptedSource::new()
            .respond(many(&ids[0..100]))
            .respond(many(&ids[100..150]));
        let client = Universalis::new(source, &config(500));

        client
            .fetch_batched(&ids, "m/{itemIds}", &NoProgress)
            .await
            .unwrap();

        assert_eq!(client.source.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_fails_whole_fetch() {
        let ids: Vec<u32> = (1..=5).collect();
        let source = ScriptedSource::new().respond(many(&ids[0..2])).fail(500);
        let client = Universalis::new(source, &config(2));

        let err = client
            .fetch_batched(&ids, "m/{itemIds}", &NoProgress)
            .await
            .unwrap_err();

        match err {
            Error::MarketDataFetch {
                url,
                batch,
                total_batches,
                first_id,
                last_id,
                source: FetchFailure::Transport(TransportError::Status { status, .. }),
            } => {
                assert_eq!(url, "m/3,4");
                assert_eq!((batch, total_batches), (2, 3));
                assert_eq!((first_id, last_id), (3, 4));
                assert_eq!(status, 500);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // No retry and no further batches
        assert_eq!(client.source.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_fetch_error() {
        let source = ScriptedSource::new().respond("not json");
        let client = Universalis::new(source, &config(100));

        let err = client
            .fetch_batched(&[1, 2], "m/{itemIds}", &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MarketDataFetch { source: FetchFailure::Decode(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_bad_item_inside_items_fails_batch() {
        let body = json!({
            "items": {
                "1": { "itemID": 1, "entries": [{ "pricePerUnit": "oops" }] },
                "2": { "itemID": 2 }
            }
        });
        let client = Universalis::new(ScriptedSource::new().respond(body.to_string()), &config(100));

        let err = client
            .fetch_batched(&[1, 2], "m/{itemIds}", &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MarketDataFetch { source: FetchFailure::Decode(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_error_object_with_ok_status_fails_batch() {
        let body = json!({ "error": "rate limited" }).to_string();
        let client = Universalis::new(
            ScriptedSource::new().respond(body.clone()).respond(body),
            &config(100),
        );

        let multi = client
            .fetch_batched(&[1, 2], "m/{itemIds}", &NoProgress)
            .await;
        assert!(matches!(
            multi,
            Err(Error::MarketDataFetch { source: FetchFailure::Decode(_), .. })
        ));

        let single = client.fetch_batched(&[7], "m/{itemIds}", &NoProgress).await;
        assert!(matches!(
            single,
            Err(Error::MarketDataFetch {
                source: FetchFailure::UnexpectedItem { requested: 7, returned: 0 },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_history_batch_names_world() {
        let client = Universalis::new(ScriptedSource::new().respond("{}"), &config(100));

        let err = client
            .sales_history(&[10, 11], 63, Duration::from_secs(86_400), &NoProgress)
            .await
            .unwrap_err();

        match err {
            Error::MarketDataFetch { url, source: FetchFailure::Decode(_), .. } => {
                assert!(url.contains("/history/63/10,11"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sales_history_url() {
        let source = ScriptedSource::new().respond(many(&[10, 11]));
        let client = Universalis::new(
            source,
            &MarketConfig {
                history_entries: Some(50),
                ..config(100)
            },
        );

        client
            .sales_history(&[10, 11], 63, Duration::from_secs(604_800), &NoProgress)
            .await
            .unwrap();

        assert_eq!(
            client.source.requested(),
            vec!["https://market.test/api/v2/history/63/10,11?entriesWithin=604800&entriesToReturn=50"]
        );
    }

    #[tokio::test]
    async fn test_current_listings_url_and_single_item_shape() {
        let body = json!({
            "itemID": 5,
            "worldID": 63,
            "listings": [{ "pricePerUnit": 50 }, { "pricePerUnit": 55 }],
            "recentHistory": [{ "pricePerUnit": 60 }]
        });
        let source = ScriptedSource::new().respond(body.to_string());
        let client = Universalis::new(source, &config(100));

        let snapshot = client.current_listings(&[5], 63, &NoProgress).await.unwrap();

        let url = &client.source.requested()[0];
        assert!(url.starts_with("https://market.test/api/v2/63/5?listings=5&entries=5&fields="));
        assert!(url.contains("fields=itemID,worldID,listings.pricePerUnit"));
        assert!(!url.contains("items."));

        assert_eq!(snapshot.get(5).unwrap().current_prices(), vec![50, 55, 60]);
    }

    #[tokio::test]
    async fn test_worlds_sorted_by_name() {
        let body = json!([
            { "id": 73, "name": "Adamantoise" },
            { "id": 63, "name": "Gilgamesh" },
            { "id": 34, "name": "Brynhildr" }
        ]);
        let client = Universalis::new(ScriptedSource::new().respond(body.to_string()), &config(100));

        let worlds = client.worlds().await.unwrap();
        let names: Vec<&str> = worlds.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["Adamantoise", "Brynhildr", "Gilgamesh"]);
        assert_eq!(client.source.requested(), vec!["https://market.test/api/v2/worlds"]);
    }

    #[tokio::test]
    async fn test_resolve_world() {
        let body = json!([{ "id": 63, "name": "Gilgamesh" }]).to_string();
        let client = Universalis::new(
            ScriptedSource::new().respond(body.clone()).respond(body),
            &config(100),
        );

        let world = client
            .resolve_world(&WorldSelector::Name("GILGAMESH".into()))
            .await
            .unwrap();
        assert_eq!(world.id, 63);

        let missing = client.resolve_world(&WorldSelector::Id(1)).await;
        assert!(matches!(
            missing,
            Err(Error::MetadataFetch { source: FetchFailure::Lookup(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_worlds_failure_is_metadata_error() {
        let client = Universalis::new(ScriptedSource::new().fail(502), &config(100));
        assert!(matches!(
            client.worlds().await,
            Err(Error::MetadataFetch { .. })
        ));
    }
}
