//! End-to-end ingest pipeline: text → extraction → geocoding → validation →
//! GeoJSON, persisting each stage's output as it goes.
//!
//! A failure stops the run where it happened. Nothing already persisted is
//! rolled back, so the stored stage marker shows how far a message got.

use std::sync::Arc;
use std::time::Instant;

use civicmap_extraction::TextExtractor;
use civicmap_shared::{
    CivicMapError, ExtractedData, Message, MessageId, MessageUpdate, NewMessage, PipelineStage,
    Result,
};
use civicmap_storage::DocumentStore;
use tracing::{info, instrument, warn};

use crate::geojson::assemble;
use crate::router::GeocodingRouter;
use crate::validate::ensure_complete;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage is reached.
    fn stage(&self, stage: PipelineStage);
    /// Called when the pipeline completes.
    fn done(&self, message: &Message);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: PipelineStage) {}
    fn done(&self, _message: &Message) {}
}

/// Runs the pipeline against injected collaborators.
pub struct MessageIngest {
    extractor: Arc<dyn TextExtractor>,
    router: GeocodingRouter,
    store: Arc<dyn DocumentStore>,
}

impl MessageIngest {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        router: GeocodingRouter,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            extractor,
            router,
            store,
        }
    }

    /// Ingest one already-validated announcement.
    ///
    /// Text with no recognizable locations completes successfully with no
    /// addresses and no GeoJSON.
    #[instrument(skip_all, fields(source = %source, mode = %self.router.mode()))]
    pub async fn ingest(
        &self,
        text: &str,
        source: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Message> {
        let start = Instant::now();

        let id = self
            .store
            .create(NewMessage {
                text: text.to_string(),
                source: source.to_string(),
            })
            .await?;
        progress.stage(PipelineStage::Stored);
        info!(%id, "message stored");

        let extracted = self.extractor.extract(text).await.inspect_err(|e| {
            warn!(%id, error = %e, "extraction failed");
        })?;
        progress.stage(PipelineStage::Extracted);

        match extracted {
            Some(data) => self.resolve(&id, data, progress).await?,
            None => info!(%id, "no locations found, skipping geocoding"),
        }

        self.advance(&id, MessageUpdate::stage(PipelineStage::Done))
            .await?;
        progress.stage(PipelineStage::Done);

        let message = self
            .store
            .get(&id)
            .await?
            .ok_or_else(|| CivicMapError::persistence(format!("message {id} disappeared")))?;

        progress.done(&message);
        info!(
            %id,
            addresses = message.addresses.len(),
            features = message.geo_json.as_ref().map_or(0, |g| g.len()),
            elapsed_ms = start.elapsed().as_millis(),
            "ingest complete"
        );
        Ok(message)
    }

    /// Stages from AddressesStored through GeoJsonStored.
    async fn resolve(
        &self,
        id: &MessageId,
        data: ExtractedData,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        self.advance(
            id,
            MessageUpdate::stage(PipelineStage::AddressesStored).with_extracted_data(data.clone()),
        )
        .await?;
        progress.stage(PipelineStage::AddressesStored);

        let outcome = self.router.geocode(&data).await?;
        progress.stage(PipelineStage::Geocoded);

        let mut update = MessageUpdate::stage(PipelineStage::GeocodingStored);
        if !outcome.addresses.is_empty() {
            update = update.with_addresses(outcome.addresses);
        }
        self.advance(id, update).await?;
        progress.stage(PipelineStage::GeocodingStored);

        ensure_complete(&data, &outcome.registry).inspect_err(|e| {
            warn!(%id, error = %e, "geocoding incomplete");
        })?;

        let geo_json = assemble(&data, &outcome.registry)?;
        progress.stage(PipelineStage::Assembled);

        self.advance(
            id,
            MessageUpdate::stage(PipelineStage::GeoJsonStored).with_geo_json(geo_json),
        )
        .await?;
        progress.stage(PipelineStage::GeoJsonStored);

        Ok(())
    }

    async fn advance(&self, id: &MessageId, update: MessageUpdate) -> Result<()> {
        let stage = update.stage;
        self.store.update(id, update).await.inspect_err(|e| {
            warn!(%id, ?stage, error = %e, "failed to persist stage");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use civicmap_geocoding::{IntersectionGeocoder, PointGeocoder};
    use civicmap_shared::{
        Address, Coordinates, GeocodingMode, Geometry, Pin, StreetSection, Timespan,
    };
    use civicmap_storage::MemoryStore;

    enum Reply {
        Data(ExtractedData),
        Nothing,
        Fail,
    }

    struct FixedExtractor(Reply);

    #[async_trait]
    impl TextExtractor for FixedExtractor {
        async fn extract(&self, _text: &str) -> Result<Option<ExtractedData>> {
            match &self.0 {
                Reply::Data(data) => Ok(Some(data.clone())),
                Reply::Nothing => Ok(None),
                Reply::Fail => Err(CivicMapError::extraction("model timed out")),
            }
        }
    }

    #[derive(Default)]
    struct Geocoders {
        table: HashMap<String, Coordinates>,
        intersections: HashMap<String, Coordinates>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl PointGeocoder for Geocoders {
        async fn geocode_batch(&self, addresses: &[String]) -> Result<Vec<Address>> {
            *self.calls.lock().unwrap() += 1;
            Ok(addresses
                .iter()
                .filter_map(|a| {
                    self.table.get(a).map(|c| Address {
                        original_text: a.clone(),
                        formatted_address: a.clone(),
                        coordinates: *c,
                    })
                })
                .collect())
        }
    }

    #[async_trait]
    impl IntersectionGeocoder for Geocoders {
        async fn resolve_streets(
            &self,
            streets: &[StreetSection],
        ) -> Result<HashMap<String, Coordinates>> {
            *self.calls.lock().unwrap() += 1;
            Ok(streets
                .iter()
                .flat_map(|s| [&s.from, &s.to])
                .filter_map(|e| self.intersections.get(e).map(|c| (e.clone(), *c)))
                .collect())
        }
    }

    /// Store that records every update and can refuse one stage.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        updates: Mutex<Vec<MessageUpdate>>,
        fail_at: Option<PipelineStage>,
    }

    impl RecordingStore {
        fn stages(&self) -> Vec<PipelineStage> {
            self.updates
                .lock()
                .unwrap()
                .iter()
                .filter_map(|u| u.stage)
                .collect()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn create(&self, message: NewMessage) -> Result<MessageId> {
            self.inner.create(message).await
        }

        async fn update(&self, id: &MessageId, update: MessageUpdate) -> Result<()> {
            if update.stage.is_some() && update.stage == self.fail_at {
                return Err(CivicMapError::persistence("disk full"));
            }
            self.updates.lock().unwrap().push(update.clone());
            self.inner.update(id, update).await
        }

        async fn get(&self, id: &MessageId) -> Result<Option<Message>> {
            self.inner.get(id).await
        }

        async fn list(&self) -> Result<Vec<Message>> {
            self.inner.list().await
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<PipelineStage>>,
        done: Mutex<bool>,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage(&self, stage: PipelineStage) {
            self.stages.lock().unwrap().push(stage);
        }
        fn done(&self, _message: &Message) {
            *self.done.lock().unwrap() = true;
        }
    }

    fn ingest_with(
        reply: Reply,
        geocoders: Geocoders,
        store: Arc<RecordingStore>,
        mode: GeocodingMode,
    ) -> (MessageIngest, Arc<Geocoders>) {
        let geocoders = Arc::new(geocoders);
        let router = GeocodingRouter::from_mode(mode, geocoders.clone(), geocoders.clone());
        let ingest = MessageIngest::new(Arc::new(FixedExtractor(reply)), router, store);
        (ingest, geocoders)
    }

    fn vitosha() -> ExtractedData {
        ExtractedData {
            pins: vec![Pin {
                address: "бул. Витоша 1".into(),
                timespans: vec![Timespan::new("05.03.2025 08:00", "05.03.2025 18:00")],
            }],
            streets: vec![],
        }
    }

    fn ignatiev() -> ExtractedData {
        ExtractedData {
            pins: vec![],
            streets: vec![StreetSection {
                street: "ул. Граф Игнатиев".into(),
                from: "ъгъл с бул. Патриарх Евтимий".into(),
                to: "УНКНОWN_PLACE".into(),
                timespans: vec![],
            }],
        }
    }

    fn table(entries: &[(&str, f64, f64)]) -> HashMap<String, Coordinates> {
        entries
            .iter()
            .map(|(k, lat, lng)| (k.to_string(), Coordinates::new(*lat, *lng)))
            .collect()
    }

    #[tokio::test]
    async fn single_pin_end_to_end() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, _) = ingest_with(
            Reply::Data(vitosha()),
            Geocoders {
                table: table(&[("бул. Витоша 1", 42.69, 23.32)]),
                ..Default::default()
            },
            store.clone(),
            GeocodingMode::Specialized,
        );
        let progress = RecordingProgress::default();

        let message = ingest
            .ingest("Спиране на водата на бул. Витоша 1", "test", &progress)
            .await
            .unwrap();

        assert_eq!(message.stage, PipelineStage::Done);
        assert_eq!(message.extracted_data, Some(vitosha()));
        assert_eq!(message.addresses.len(), 1);
        let geo = message.geo_json.unwrap();
        assert_eq!(geo.len(), 1);
        assert_eq!(
            geo.features[0].geometry,
            Geometry::Point {
                coordinates: [23.32, 42.69]
            }
        );

        assert_eq!(
            store.stages(),
            [
                PipelineStage::AddressesStored,
                PipelineStage::GeocodingStored,
                PipelineStage::GeoJsonStored,
                PipelineStage::Done,
            ]
        );
        assert_eq!(
            *progress.stages.lock().unwrap(),
            [
                PipelineStage::Stored,
                PipelineStage::Extracted,
                PipelineStage::AddressesStored,
                PipelineStage::Geocoded,
                PipelineStage::GeocodingStored,
                PipelineStage::Assembled,
                PipelineStage::GeoJsonStored,
                PipelineStage::Done,
            ]
        );
        assert!(*progress.done.lock().unwrap());
    }

    #[tokio::test]
    async fn unresolved_endpoint_fails_without_geojson() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, _) = ingest_with(
            Reply::Data(ignatiev()),
            Geocoders {
                intersections: table(&[("ъгъл с бул. Патриарх Евтимий", 42.69, 23.33)]),
                ..Default::default()
            },
            store.clone(),
            GeocodingMode::Specialized,
        );

        let err = ingest
            .ingest("ремонт на ул. Граф Игнатиев", "test", &SilentProgress)
            .await
            .unwrap_err();

        match err {
            CivicMapError::GeocodingIncomplete { missing } => {
                assert_eq!(missing, ["ул. Граф Игнатиев to: УНКНОWN_PLACE"]);
            }
            other => panic!("expected GeocodingIncomplete, got {other}"),
        }

        let stored = store.list().await.unwrap().remove(0);
        assert_eq!(stored.stage, PipelineStage::GeocodingStored);
        assert!(stored.geo_json.is_none());
        assert_eq!(stored.addresses.len(), 1);
        assert!(store.updates.lock().unwrap().iter().all(|u| u.geo_json.is_none()));
    }

    #[tokio::test]
    async fn unified_mode_is_validated_too() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, _) = ingest_with(
            Reply::Data(ignatiev()),
            Geocoders {
                table: table(&[("ъгъл с бул. Патриарх Евтимий", 42.69, 23.33)]),
                ..Default::default()
            },
            store,
            GeocodingMode::Unified,
        );

        let err = ingest.ingest("текст", "test", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CivicMapError::GeocodingIncomplete { .. }));
    }

    #[tokio::test]
    async fn no_locations_completes_without_geocoding() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, geocoders) = ingest_with(
            Reply::Nothing,
            Geocoders::default(),
            store.clone(),
            GeocodingMode::Specialized,
        );

        let message = ingest
            .ingest("Честит празник!", "test", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(message.stage, PipelineStage::Done);
        assert!(message.addresses.is_empty());
        assert!(message.extracted_data.is_none());
        assert!(message.geo_json.is_none());
        assert_eq!(*geocoders.calls.lock().unwrap(), 0);
        assert_eq!(store.stages(), [PipelineStage::Done]);
    }

    #[tokio::test]
    async fn extraction_failure_stops_at_stored() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, geocoders) = ingest_with(
            Reply::Fail,
            Geocoders::default(),
            store.clone(),
            GeocodingMode::Specialized,
        );

        let err = ingest.ingest("текст", "test", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CivicMapError::ExtractionFailed(_)));
        assert_eq!(*geocoders.calls.lock().unwrap(), 0);

        let stored = store.list().await.unwrap().remove(0);
        assert_eq!(stored.stage, PipelineStage::Stored);
        assert!(store.stages().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_aborts_remaining_stages() {
        let store = Arc::new(RecordingStore {
            fail_at: Some(PipelineStage::GeocodingStored),
            ..Default::default()
        });
        let (ingest, _) = ingest_with(
            Reply::Data(vitosha()),
            Geocoders {
                table: table(&[("бул. Витоша 1", 42.69, 23.32)]),
                ..Default::default()
            },
            store.clone(),
            GeocodingMode::Specialized,
        );

        let err = ingest.ingest("текст", "test", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CivicMapError::PersistenceFailed(_)));

        let stored = store.list().await.unwrap().remove(0);
        assert_eq!(stored.stage, PipelineStage::AddressesStored);
        assert_eq!(stored.extracted_data, Some(vitosha()));
        assert!(stored.addresses.is_empty());
    }

    #[tokio::test]
    async fn nothing_resolved_keeps_addresses_unwritten() {
        let store = Arc::new(RecordingStore::default());
        let (ingest, _) = ingest_with(
            Reply::Data(vitosha()),
            Geocoders::default(),
            store.clone(),
            GeocodingMode::Unified,
        );

        let err = ingest.ingest("текст", "test", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, CivicMapError::GeocodingIncomplete { .. }));

        let updates = store.updates.lock().unwrap();
        let geocoding = updates
            .iter()
            .find(|u| u.stage == Some(PipelineStage::GeocodingStored))
            .unwrap();
        assert!(geocoding.addresses.is_none());
    }
}
