//! Mutable rig session over immutable snapshots.
//!
//! Every mutation clones the current rig (or settings), applies the change,
//! runs the full pipeline, and only then swaps rig, settings and report in
//! together. A reader holding an older `Arc` keeps a consistent old view.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::crest::{parse_curve, ContentProfile, FormulaError, RangeWarning};
use crate::domain::{
    Amplifier, BridgeError, DistroChannel, EntityId, Generator, GlobalSettings, PoweredSpeaker,
    Rig, RigDocument, Speaker, ValidationError,
};
use crate::power_flow::{derate_breakdown, recalculate, RigReport};
use crate::topology::{
    remove_connection, remove_touching, ConnectOutcome, ConnectionEditor, SourceRef, TargetRef,
    TopologyError,
};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("formula rejected: {0}")]
    Formula(#[from] FormulaError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("invalid rig: {0}")]
    Validation(#[from] ValidationError),
    #[error("rig document: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Consistent rig, settings and report from one pipeline run
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub rig: Arc<Rig>,
    pub settings: Arc<GlobalSettings>,
    pub report: Arc<RigReport>,
}

/// Editing session for one rig
#[derive(Debug)]
pub struct RigWorkspace {
    rig: Arc<Rig>,
    settings: Arc<GlobalSettings>,
    report: Arc<RigReport>,
    editor: ConnectionEditor,
    scheduled_removals: Vec<EntityId>,
}

impl Default for RigWorkspace {
    fn default() -> Self {
        Self::new(GlobalSettings::default())
    }
}

impl RigWorkspace {
    /// Empty rig under the given settings
    pub fn new(settings: GlobalSettings) -> Self {
        let rig = Rig::new();
        let report = recalculate(&rig, &settings);
        Self {
            rig: Arc::new(rig),
            settings: Arc::new(settings),
            report: Arc::new(report),
            editor: ConnectionEditor::new(),
            scheduled_removals: Vec::new(),
        }
    }

    /// Workspace over an existing rig, validated at the boundary
    pub fn open(rig: Rig, settings: GlobalSettings) -> Result<Self> {
        settings.validate()?;
        rig.validate()?;
        let report = recalculate(&rig, &settings);
        info!(
            generators = rig.generators.len(),
            amplifiers = rig.amplifiers.len(),
            speakers = rig.speakers.len(),
            connections = rig.connections.len(),
            "Opened rig"
        );
        Ok(Self {
            rig: Arc::new(rig),
            settings: Arc::new(settings),
            report: Arc::new(report),
            editor: ConnectionEditor::new(),
            scheduled_removals: Vec::new(),
        })
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn report(&self) -> &RigReport {
        &self.report
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rig: Arc::clone(&self.rig),
            settings: Arc::clone(&self.settings),
            report: Arc::clone(&self.report),
        }
    }

    fn commit(&mut self, rig: Rig, settings: GlobalSettings) {
        let report = recalculate(&rig, &settings);
        self.rig = Arc::new(rig);
        self.settings = Arc::new(settings);
        self.report = Arc::new(report);
    }

    fn apply(&mut self, edit: impl FnOnce(&mut Rig)) {
        let mut rig = Rig::clone(&self.rig);
        edit(&mut rig);
        let settings = GlobalSettings::clone(&self.settings);
        self.commit(rig, settings);
    }

    /// Copy-on-write edit of the rig followed by a full recalculation
    ///
    /// Nothing is swapped in when `edit` fails.
    fn mutate<T>(&mut self, edit: impl FnOnce(&mut Rig) -> Result<T>) -> Result<T> {
        let mut rig = Rig::clone(&self.rig);
        let value = edit(&mut rig)?;
        let settings = GlobalSettings::clone(&self.settings);
        self.commit(rig, settings);
        Ok(value)
    }

    fn mutate_with_editor<T>(
        &mut self,
        edit: impl FnOnce(&mut ConnectionEditor, &mut Rig) -> Result<T>,
    ) -> Result<T> {
        let mut editor = std::mem::take(&mut self.editor);
        let result = self.mutate(|rig| edit(&mut editor, rig));
        self.editor = editor;
        result
    }

    // ------------------------------------------------------------------
    // Equipment
    // ------------------------------------------------------------------

    pub fn add_generator(&mut self, generator: Generator) -> EntityId {
        let id = generator.id;
        info!(name = %generator.name, "Adding generator");
        self.apply(|rig| rig.generators.push(generator));
        id
    }

    pub fn add_distro_channel(&mut self, generator: EntityId, channel: DistroChannel) -> Result<EntityId> {
        let id = channel.id;
        self.mutate(|rig| {
            let gen = rig
                .generators
                .iter_mut()
                .find(|g| g.id == generator)
                .ok_or(WorkspaceError::UnknownEntity(generator))?;
            gen.channels.push(channel);
            Ok(id)
        })
    }

    pub fn add_amplifier(&mut self, amplifier: Amplifier) -> EntityId {
        let id = amplifier.id;
        info!(name = %amplifier.name, channels = amplifier.channels.len(), "Adding amplifier");
        self.apply(|rig| rig.amplifiers.push(amplifier));
        id
    }

    pub fn add_speaker(&mut self, speaker: Speaker) -> EntityId {
        let id = speaker.id;
        info!(name = %speaker.name, quantity = speaker.quantity, "Adding speaker");
        self.apply(|rig| rig.speakers.push(speaker));
        id
    }

    pub fn add_powered_speaker(&mut self, speaker: PoweredSpeaker) -> EntityId {
        let id = speaker.id;
        info!(name = %speaker.name, quantity = speaker.quantity, "Adding powered speaker");
        self.apply(|rig| rig.powered_speakers.push(speaker));
        id
    }

    /// Remove a generator, its outlets, and every edge leaving them
    pub fn remove_generator(&mut self, id: EntityId) -> Result<Generator> {
        self.mutate(|rig| {
            let index = rig
                .generators
                .iter()
                .position(|g| g.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            let gen = rig.generators.remove(index);
            let ids: Vec<EntityId> = std::iter::once(gen.id)
                .chain(gen.channels.iter().map(|c| c.id))
                .collect();
            let edges = remove_touching(&mut rig.connections, &ids);
            info!(name = %gen.name, edges, "Removed generator");
            Ok(gen)
        })
    }

    pub fn remove_distro_channel(&mut self, id: EntityId) -> Result<DistroChannel> {
        self.mutate(|rig| {
            let channel = rig
                .generators
                .iter_mut()
                .find_map(|g| {
                    let index = g.channels.iter().position(|c| c.id == id)?;
                    Some(g.channels.remove(index))
                })
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            let edges = remove_touching(&mut rig.connections, &[id]);
            info!(name = %channel.name, edges, "Removed distro channel");
            Ok(channel)
        })
    }

    /// Remove an amplifier, its channels, and every edge at any of them
    pub fn remove_amplifier(&mut self, id: EntityId) -> Result<Amplifier> {
        self.mutate(|rig| {
            let index = rig
                .amplifiers
                .iter()
                .position(|a| a.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            let amp = rig.amplifiers.remove(index);
            let ids: Vec<EntityId> = std::iter::once(amp.id)
                .chain(amp.channels.iter().map(|c| c.id))
                .collect();
            let edges = remove_touching(&mut rig.connections, &ids);
            info!(name = %amp.name, edges, "Removed amplifier");
            Ok(amp)
        })
    }

    pub fn remove_speaker(&mut self, id: EntityId) -> Result<Speaker> {
        let speaker = self.mutate(|rig| {
            let index = rig
                .speakers
                .iter()
                .position(|s| s.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            let speaker = rig.speakers.remove(index);
            let edges = remove_touching(&mut rig.connections, &[id]);
            info!(name = %speaker.name, edges, "Removed speaker");
            Ok(speaker)
        })?;
        self.scheduled_removals.retain(|&s| s != id);
        Ok(speaker)
    }

    pub fn remove_powered_speaker(&mut self, id: EntityId) -> Result<PoweredSpeaker> {
        self.mutate(|rig| {
            let index = rig
                .powered_speakers
                .iter()
                .position(|s| s.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            let speaker = rig.powered_speakers.remove(index);
            let edges = remove_touching(&mut rig.connections, &[id]);
            info!(name = %speaker.name, edges, "Removed powered speaker");
            Ok(speaker)
        })
    }

    // ------------------------------------------------------------------
    // Parameter edits
    // ------------------------------------------------------------------

    pub fn update_generator(&mut self, id: EntityId, edit: impl FnOnce(&mut Generator)) -> Result<()> {
        self.mutate(|rig| {
            let gen = rig
                .generators
                .iter_mut()
                .find(|g| g.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            edit(gen);
            Ok(())
        })
    }

    pub fn update_amplifier(&mut self, id: EntityId, edit: impl FnOnce(&mut Amplifier)) -> Result<()> {
        self.mutate(|rig| {
            let amp = rig
                .amplifiers
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            edit(amp);
            Ok(())
        })
    }

    pub fn update_speaker(&mut self, id: EntityId, edit: impl FnOnce(&mut Speaker)) -> Result<()> {
        self.mutate(|rig| {
            let speaker = rig
                .speakers
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            edit(speaker);
            Ok(())
        })
    }

    pub fn update_powered_speaker(
        &mut self,
        id: EntityId,
        edit: impl FnOnce(&mut PoweredSpeaker),
    ) -> Result<()> {
        self.mutate(|rig| {
            let speaker = rig
                .powered_speakers
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(WorkspaceError::UnknownEntity(id))?;
            edit(speaker);
            Ok(())
        })
    }

    pub fn bridge(&mut self, amplifier: EntityId, primary_index: usize) -> Result<()> {
        self.mutate(|rig| {
            let amp = rig
                .amplifiers
                .iter_mut()
                .find(|a| a.id == amplifier)
                .ok_or(WorkspaceError::UnknownEntity(amplifier))?;
            amp.bridge(primary_index)?;
            info!(name = %amp.name, primary_index, "Bridged channels");
            Ok(())
        })
    }

    pub fn unbridge(&mut self, amplifier: EntityId, primary_index: usize) -> Result<()> {
        self.mutate(|rig| {
            let amp = rig
                .amplifiers
                .iter_mut()
                .find(|a| a.id == amplifier)
                .ok_or(WorkspaceError::UnknownEntity(amplifier))?;
            amp.unbridge(primary_index)?;
            info!(name = %amp.name, primary_index, "Unbridged channels");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Replace the settings; rejected settings leave everything untouched
    pub fn set_settings(&mut self, settings: GlobalSettings) -> Result<()> {
        settings.validate()?;
        let rig = Rig::clone(&self.rig);
        self.commit(rig, settings);
        info!(profile = %self.settings.content_profile, "Settings updated");
        Ok(())
    }

    pub fn update_settings(&mut self, edit: impl FnOnce(&mut GlobalSettings)) -> Result<()> {
        let mut settings = GlobalSettings::clone(&self.settings);
        edit(&mut settings);
        self.set_settings(settings)
    }

    /// Install the curve generated from `formula` as the custom profile
    ///
    /// On a rejected formula the current curve stays in place. Values clamped
    /// into range are returned as warnings.
    pub fn apply_formula(&mut self, formula: &str) -> Result<Vec<RangeWarning>> {
        let generated = match parse_curve(formula) {
            Ok(curve) => curve,
            Err(e) => {
                warn!(formula, error = %e, "Crest formula rejected");
                return Err(e.into());
            }
        };
        for w in &generated.warnings {
            warn!(formula, "{}", w);
        }

        let mut settings = GlobalSettings::clone(&self.settings);
        settings.content_profile = ContentProfile::Custom;
        settings.crest_curve = generated.curve;
        settings.crest_formula = Some(generated.formula);
        self.set_settings(settings)?;
        Ok(generated.warnings)
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    pub fn pending_source(&self) -> Option<SourceRef> {
        self.editor.pending()
    }

    /// Select a connection source
    pub fn begin_connection(&mut self, source: SourceRef) -> Result<()> {
        if !self.rig.has_source(source.kind, source.id) {
            return Err(WorkspaceError::UnknownEntity(source.id));
        }
        self.mutate_with_editor(|editor, rig| {
            editor.begin(&mut rig.connections, source);
            Ok(())
        })
    }

    /// Finish a connection on `target`
    ///
    /// A distro wired into a passive speaker destroys the speaker: no edge is
    /// made and the speaker is queued in [`Self::scheduled_removals`].
    pub fn complete_connection(&mut self, target: TargetRef) -> Result<ConnectOutcome> {
        if !self.rig.has_target(target.kind, target.id) {
            self.editor.cancel();
            return Err(WorkspaceError::UnknownEntity(target.id));
        }
        let outcome =
            self.mutate_with_editor(|editor, rig| Ok(editor.complete(&mut rig.connections, target)?))?;

        if let ConnectOutcome::OvervoltageFault { speaker } = outcome {
            warn!(%speaker, "Overvoltage: speaker destroyed, scheduled for removal");
            if !self.scheduled_removals.contains(&speaker) {
                self.scheduled_removals.push(speaker);
            }
        }
        Ok(outcome)
    }

    pub fn cancel_connection(&mut self) {
        self.editor.cancel();
    }

    /// Click a terminal; with no source selected this disconnects an edge there
    pub fn click_terminal(&mut self, endpoint: EntityId) -> Result<Option<EntityId>> {
        self.mutate_with_editor(|editor, rig| {
            Ok(editor
                .click_terminal(&mut rig.connections, endpoint)
                .map(|c| c.id))
        })
    }

    pub fn disconnect(&mut self, connection: EntityId) -> Result<()> {
        self.mutate(|rig| {
            remove_connection(&mut rig.connections, connection)
                .map(|_| ())
                .ok_or(WorkspaceError::UnknownEntity(connection))
        })
    }

    /// Speakers destroyed by an overvoltage fault, awaiting removal
    pub fn scheduled_removals(&self) -> &[EntityId] {
        &self.scheduled_removals
    }

    /// Remove every speaker destroyed by a fault; returns how many were removed
    pub fn complete_scheduled_removals(&mut self) -> usize {
        let pending = std::mem::take(&mut self.scheduled_removals);
        pending
            .into_iter()
            .filter(|&id| self.remove_speaker(id).is_ok())
            .count()
    }

    // ------------------------------------------------------------------
    // Reporting and documents
    // ------------------------------------------------------------------

    /// Audit strings for a generator's capacity derating
    pub fn derate_breakdown(&self, generator: EntityId) -> Option<Vec<String>> {
        let gen = self.rig.generator(generator)?;
        let report = self.report.generator(generator)?;
        Some(derate_breakdown(gen, report, &self.settings))
    }

    pub fn export_document(&self) -> RigDocument {
        RigDocument {
            settings: GlobalSettings::clone(&self.settings),
            rig: Rig::clone(&self.rig),
            report: Some(RigReport::clone(&self.report)),
        }
    }

    /// Open a document; any report it carries is discarded and recomputed
    pub fn import_document(document: RigDocument) -> Result<Self> {
        Self::open(document.rig, document.settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_document())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: RigDocument = serde_json::from_str(json)?;
        Self::import_document(document)
    }
}
