use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ViewerConfig;
use crate::data::aggregate::{AggregateParams, aggregate, ratio_domain};
use crate::data::classify::GroupKey;
use crate::data::demographics::GroupingField;
use crate::data::error::DataError;
use crate::data::insights::{AgeRange, BandPoint, CohortData, Comparison, load_cohort_data};
use crate::data::loader::{Dataset, SeriesSchema, SeriesSource, subjects_by_group};
use crate::data::model::{Metric, Series, SubjectId, SubjectInfo, extent_of, pad};
use crate::playback::breath::DetectorPolicy;
use crate::playback::player::{Track, TrackLabel};
use crate::playback::session::Session;
use crate::ui::chart::ChartRenderer;
use crate::ui::lung::GaugeScales;
use crate::worker::{LoadEvent, Worker};

// ---------------------------------------------------------------------------
// Views and selections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Breathing,
    ChestAbdomen,
    Demographics,
    Insights,
}

impl View {
    pub const ALL: [View; 4] = [
        View::Breathing,
        View::ChestAbdomen,
        View::Demographics,
        View::Insights,
    ];

    pub fn label(self) -> &'static str {
        match self {
            View::Breathing => "Breathing",
            View::ChestAbdomen => "Chest vs. Abdomen",
            View::Demographics => "Demographics",
            View::Insights => "Insights",
        }
    }
}

/// The two animated visualizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Breathing,
    ChestAbdomen,
}

impl PanelKind {
    pub fn schema(self) -> SeriesSchema {
        match self {
            PanelKind::Breathing => SeriesSchema::VENTILATION,
            PanelKind::ChestAbdomen => SeriesSchema::AERATION,
        }
    }

    pub fn max_time(self, config: &ViewerConfig) -> f64 {
        match self {
            PanelKind::Breathing => config.breathing_max_time,
            PanelKind::ChestAbdomen => config.chest_abdomen_max_time,
        }
    }

    /// Charts shown for a selection, top to bottom.
    pub fn metrics(self, selection: Selection) -> &'static [Metric] {
        match (self, selection) {
            (PanelKind::Breathing, _) => &[Metric::Volume, Metric::Flow],
            (PanelKind::ChestAbdomen, Selection::Subject(_)) => &[Metric::Chest, Metric::Abdomen],
            (PanelKind::ChestAbdomen, Selection::AllGroups) => &[Metric::Ratio],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Subject(SubjectId),
    AllGroups,
}

// ---------------------------------------------------------------------------
// Panel – one animated visualization
// ---------------------------------------------------------------------------

pub struct Panel {
    pub kind: PanelKind,
    pub session: Session,
    pub selection: Option<Selection>,
    /// Bumped on every selection change; loads tagged with an older value
    /// are discarded.
    pub generation: u64,
    pub loading: bool,
    /// Load failure shown inside this panel only.
    pub error: Option<String>,
    /// Informational message, e.g. no data for any group.
    pub notice: Option<String>,
    pub groups: Option<BTreeMap<GroupKey, Arc<Series>>>,
    pub charts: Vec<ChartRenderer>,
    pub gauge: Option<GaugeScales>,
    pub policy: DetectorPolicy,
}

impl Panel {
    pub fn new(kind: PanelKind, config: &ViewerConfig) -> Self {
        Self {
            kind,
            session: config.session(),
            selection: None,
            generation: 0,
            loading: false,
            error: None,
            notice: None,
            groups: None,
            charts: Vec::new(),
            gauge: None,
            policy: config.breath.policy,
        }
    }

    fn chart_id(&self, metric: Metric) -> String {
        format!("{:?}_{:?}", self.kind, metric)
    }

    /// Play a single subject's series.
    fn start_subject(&mut self, id: SubjectId, series: Series) {
        self.loading = false;
        if series.is_empty() {
            self.notice = Some(format!("Subject {id} has no samples in range"));
            return;
        }
        log::info!(
            "{:?} panel: subject {id}, {} samples up to {:.1}s",
            self.kind,
            series.len(),
            series.end_time().unwrap_or(0.0)
        );
        let series = Arc::new(series);
        let metrics = self.kind.metrics(Selection::Subject(id));
        self.charts = metrics
            .iter()
            .map(|&m| {
                let domain = subject_domain(&series, m);
                ChartRenderer::new(self.chart_id(m), m, domain, m == Metric::Volume)
            })
            .collect();
        self.gauge = Some(GaugeScales::from_series(&series));
        self.start(vec![Track::new(TrackLabel::Subject(id), series)]);
    }

    /// Play the group comparison, if the averages are ready.
    fn start_groups(&mut self) {
        let Some(groups) = &self.groups else {
            self.loading = true;
            return;
        };
        self.loading = false;
        let tracks: Vec<Track> = GroupKey::COMPARED
            .iter()
            .filter_map(|g| groups.get(g).map(|s| Track::new(TrackLabel::Group(*g), s.clone())))
            .collect();
        if tracks.is_empty() {
            self.notice = Some("No group has data to compare".to_string());
            return;
        }

        let metrics = self.kind.metrics(Selection::AllGroups);
        self.charts = metrics
            .iter()
            .map(|&m| {
                let domain = group_domain(tracks.iter().map(|t| t.series.as_ref()), m);
                ChartRenderer::new(self.chart_id(m), m, domain, false)
            })
            .collect();
        self.gauge = None;
        self.start(tracks);
    }

    fn start(&mut self, tracks: Vec<Track>) {
        if let Err(e) = self.session.restart(tracks) {
            log::error!("{:?} panel: {e}", self.kind);
            self.error = Some(e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Insights – cohort comparisons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightTab {
    Asthma,
    SmokingVaping,
    Sex,
    Age,
}

impl InsightTab {
    pub const ALL: [InsightTab; 4] = [
        InsightTab::Asthma,
        InsightTab::SmokingVaping,
        InsightTab::Sex,
        InsightTab::Age,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InsightTab::Asthma => "Asthma Impact",
            InsightTab::SmokingVaping => "Smoking & Vaping",
            InsightTab::Sex => "Sex Differences",
            InsightTab::Age => "Age Effects",
        }
    }
}

/// Metrics the sex comparison can show.
pub const SEX_METRICS: [Metric; 5] = [
    Metric::Flow,
    Metric::Pressure,
    Metric::Volume,
    Metric::Chest,
    Metric::Abdomen,
];

/// Mean curve of one cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortBand {
    pub label: String,
    /// Subjects in the cohort, with or without a recording.
    pub members: usize,
    pub points: Vec<BandPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BandKey {
    tab: InsightTab,
    substance: Comparison,
    sex_metric: Metric,
    age_range: AgeRange,
}

pub struct Insights {
    pub tab: InsightTab,
    /// Smoking or vaping on the smoking & vaping tab.
    pub substance: Comparison,
    pub sex_metric: Metric,
    pub age_range: AgeRange,
    pub data: Option<CohortData>,
    pub loading: bool,
    cached: Option<(BandKey, Vec<CohortBand>)>,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            tab: InsightTab::Asthma,
            substance: Comparison::Smoking,
            sex_metric: Metric::Flow,
            age_range: AgeRange::PRESETS[0],
            data: None,
            loading: false,
            cached: None,
        }
    }
}

impl Insights {
    /// The split the active tab compares, or `None` for the age tab.
    pub fn comparison(&self) -> Option<Comparison> {
        match self.tab {
            InsightTab::Asthma => Some(Comparison::Asthma),
            InsightTab::SmokingVaping => Some(self.substance),
            InsightTab::Sex => Some(Comparison::Sex),
            InsightTab::Age => None,
        }
    }

    pub fn metric(&self) -> Metric {
        match self.tab {
            InsightTab::Sex => self.sex_metric,
            _ => Metric::Flow,
        }
    }

    fn key(&self) -> BandKey {
        BandKey {
            tab: self.tab,
            substance: self.substance,
            sex_metric: self.sex_metric,
            age_range: self.age_range,
        }
    }

    fn set_data(&mut self, data: CohortData) {
        self.data = Some(data);
        self.loading = false;
        self.cached = None;
    }

    /// Cohort curves for the active tab, recomputed only when the controls
    /// or the data change.
    pub fn bands(&mut self, subjects: &[SubjectInfo], bin_width: f64, window: f64) -> &[CohortBand] {
        let key = self.key();
        if self.cached.as_ref().map(|(k, _)| k) != Some(&key) {
            let Some(data) = &self.data else {
                return &[];
            };
            let metric = self.metric();
            let cohorts: Vec<(String, Vec<SubjectId>)> = match self.comparison() {
                Some(comparison) => {
                    let [first, second] = comparison.split(subjects);
                    let [a, b] = comparison.cohort_labels();
                    vec![(a.to_string(), first), (b.to_string(), second)]
                }
                None => vec![(
                    format!("Ages {}", self.age_range.label()),
                    self.age_range.members(subjects),
                )],
            };
            let bands = cohorts
                .into_iter()
                .map(|(label, ids)| CohortBand {
                    points: data.band(&ids, metric, bin_width, window),
                    members: ids.len(),
                    label,
                })
                .collect();
            self.cached = Some((key, bands));
        }
        match &self.cached {
            Some((_, bands)) => bands.as_slice(),
            None => &[],
        }
    }
}

/// Group means for a panel: the breathing view takes a non-empty
/// precomputed table, anything else is averaged from the subject files.
fn group_means<S: SeriesSource + ?Sized>(
    kind: PanelKind,
    precomputed: Option<Result<BTreeMap<GroupKey, Series>, DataError>>,
    source: &S,
    by_group: &BTreeMap<GroupKey, Vec<SubjectId>>,
    params: AggregateParams,
) -> BTreeMap<GroupKey, Series> {
    if kind == PanelKind::Breathing {
        match precomputed {
            Some(Ok(groups)) if !groups.is_empty() => {
                log::info!("Using precomputed group means ({} groups)", groups.len());
                return groups;
            }
            Some(Ok(_)) => log::warn!("Precomputed group table is empty, averaging instead"),
            Some(Err(e)) => log::warn!("{e}, averaging instead"),
            None => {}
        }
    }
    aggregate(source, by_group, kind.schema(), params)
}

/// Y-domain for one subject's chart.
fn subject_domain(series: &Series, metric: Metric) -> (f64, f64) {
    let domain = match metric {
        Metric::Flow => {
            let m = series.max_abs_flow();
            (m > 0.0).then(|| (-m * 1.1, m * 1.1))
        }
        Metric::Volume => series
            .padded_extent(metric, 0.05)
            .map(|(lo, hi)| (lo.max(0.0), hi)),
        Metric::Ratio => ratio_domain([series]),
        Metric::Chest | Metric::Abdomen | Metric::Pressure => series.padded_extent(metric, 0.05),
    };
    domain.unwrap_or((0.0, 1.0))
}

/// Y-domain shared by all group lines of one chart.
fn group_domain<'a>(series: impl Iterator<Item = &'a Series> + Clone, metric: Metric) -> (f64, f64) {
    let domain = match metric {
        Metric::Ratio => ratio_domain(series),
        _ => extent_of(series.flat_map(|s| s.samples().iter().map(move |x| metric.value(x))))
            .map(|(lo, hi)| pad(lo, hi, 0.05)),
    };
    domain.unwrap_or((0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub dataset: Option<Dataset>,
    pub config: ViewerConfig,
    pub subjects: Vec<SubjectInfo>,
    pub view: View,
    pub breathing: Panel,
    pub chest_abdomen: Panel,
    pub insights: Insights,
    pub grouping_field: GroupingField,
    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
    pub loading_subjects: bool,
    /// Bumped whenever a dataset is opened; background loads from an older
    /// folder are discarded.
    pub dataset_generation: u64,
    pub worker: Worker,
}

impl Default for AppState {
    fn default() -> Self {
        let config = ViewerConfig::default();
        Self {
            dataset: None,
            breathing: Panel::new(PanelKind::Breathing, &config),
            chest_abdomen: Panel::new(PanelKind::ChestAbdomen, &config),
            insights: Insights::default(),
            config,
            subjects: Vec::new(),
            view: View::Breathing,
            grouping_field: GroupingField::Sex,
            status_message: None,
            loading_subjects: false,
            dataset_generation: 0,
            worker: Worker::default(),
        }
    }
}

impl AppState {
    pub fn panel(&self, kind: PanelKind) -> &Panel {
        match kind {
            PanelKind::Breathing => &self.breathing,
            PanelKind::ChestAbdomen => &self.chest_abdomen,
        }
    }

    pub fn panel_mut(&mut self, kind: PanelKind) -> &mut Panel {
        match kind {
            PanelKind::Breathing => &mut self.breathing,
            PanelKind::ChestAbdomen => &mut self.chest_abdomen,
        }
    }

    pub fn subject(&self, id: SubjectId) -> Option<&SubjectInfo> {
        self.subjects.iter().find(|s| s.id == id)
    }

    /// Switch to a dataset folder: read its config, reset both panels and
    /// start loading the subject table.
    pub fn open_dataset(&mut self, root: PathBuf) {
        let dataset = Dataset::new(root);
        log::info!("Opening dataset {}", dataset.root().display());

        self.config = ViewerConfig::load_or_default(&dataset.config_path());
        self.breathing.session.cancel();
        self.chest_abdomen.session.cancel();
        self.breathing = Panel::new(PanelKind::Breathing, &self.config);
        self.chest_abdomen = Panel::new(PanelKind::ChestAbdomen, &self.config);
        self.insights = Insights::default();
        self.subjects.clear();
        self.status_message = None;
        self.loading_subjects = true;
        self.dataset_generation += 1;

        let job_dataset = dataset.clone();
        let generation = self.dataset_generation;
        self.worker.spawn(move || LoadEvent::Subjects {
            dataset: generation,
            result: job_dataset.load_subjects(),
        });
        self.dataset = Some(dataset);
    }

    /// Change what a panel plays. The running animation stops right away;
    /// the new one starts when its data is ready.
    pub fn select(&mut self, kind: PanelKind, selection: Selection) {
        let dataset = self.dataset.clone();
        let dataset_generation = self.dataset_generation;
        let max_time = kind.max_time(&self.config);
        let panel = self.panel_mut(kind);
        panel.session.cancel();
        panel.generation += 1;
        panel.selection = Some(selection);
        panel.error = None;
        panel.notice = None;

        match selection {
            Selection::AllGroups => panel.start_groups(),
            Selection::Subject(id) => {
                let Some(dataset) = dataset else {
                    return;
                };
                panel.loading = true;
                let generation = panel.generation;
                self.worker.spawn(move || LoadEvent::Series {
                    dataset: dataset_generation,
                    panel: kind,
                    generation,
                    id,
                    result: dataset.load_series(id, kind.schema(), max_time),
                });
            }
        }
    }

    /// Restart the current selection from the beginning.
    pub fn replay(&mut self, kind: PanelKind) {
        if let Some(selection) = self.panel(kind).selection {
            self.select(kind, selection);
        }
    }

    pub fn set_policy(&mut self, kind: PanelKind, policy: DetectorPolicy) {
        let threshold = self.config.breath.flow_threshold;
        let panel = self.panel_mut(kind);
        panel.policy = policy;
        panel.session.set_policy(policy.build(threshold));
    }

    fn load_group_averages(&mut self, kind: PanelKind) {
        let Some(dataset) = self.dataset.clone() else {
            return;
        };
        let generation = self.dataset_generation;
        let params = self.config.aggregate_params(kind.max_time(&self.config));
        let mut by_group = subjects_by_group(&self.subjects);
        by_group.retain(|g, _| GroupKey::COMPARED.contains(g));

        self.worker.spawn(move || {
            // the breathing view can use precomputed means shipped with the dataset
            let precomputed = match kind {
                PanelKind::Breathing => dataset.load_grouped_table(kind.schema(), params.max_time),
                PanelKind::ChestAbdomen => None,
            };
            LoadEvent::Groups {
                dataset: generation,
                panel: kind,
                groups: group_means(kind, precomputed, &dataset, &by_group, params),
            }
        });
    }

    /// Start loading the recordings behind the insight charts, once per
    /// dataset.
    pub fn ensure_insights(&mut self) {
        if self.insights.data.is_some() || self.insights.loading || self.subjects.is_empty() {
            return;
        }
        let Some(dataset) = self.dataset.clone() else {
            return;
        };
        self.insights.loading = true;
        let generation = self.dataset_generation;
        let ids: Vec<SubjectId> = self.subjects.iter().map(|s| s.id).collect();
        let window = self.config.insights.window;
        let max_time = self.config.breathing_max_time;
        self.worker.spawn(move || LoadEvent::Cohorts {
            dataset: generation,
            data: load_cohort_data(&dataset, &ids, window, max_time),
        });
    }

    /// Apply every finished background load.
    pub fn poll(&mut self) {
        for event in self.worker.drain() {
            self.handle(event);
        }
    }

    pub fn handle(&mut self, event: LoadEvent) {
        if event.dataset() != self.dataset_generation {
            log::debug!("dropping a load from a previously opened dataset");
            return;
        }
        match event {
            LoadEvent::Subjects {
                result: Ok(subjects),
                ..
            } => {
                self.loading_subjects = false;
                self.subjects = subjects;
                self.load_group_averages(PanelKind::Breathing);
                self.load_group_averages(PanelKind::ChestAbdomen);
                if let Some(first) = self.subjects.first().map(|s| s.id) {
                    self.select(PanelKind::Breathing, Selection::Subject(first));
                    self.select(PanelKind::ChestAbdomen, Selection::Subject(first));
                }
            }
            LoadEvent::Subjects { result: Err(e), .. } => {
                log::error!("Failed to load subject table: {e}");
                self.loading_subjects = false;
                self.status_message = Some(format!("Error loading subject data: {e}"));
            }
            LoadEvent::Series {
                panel: kind,
                generation,
                id,
                result,
                ..
            } => {
                let panel = self.panel_mut(kind);
                if generation != panel.generation {
                    log::debug!("dropping stale load of subject {id} for {kind:?}");
                    return;
                }
                match result {
                    Ok(series) => panel.start_subject(id, series),
                    Err(e) => {
                        log::error!("{kind:?} panel: {e}");
                        panel.loading = false;
                        panel.error = Some(format!("Error loading data for Subject {id}: {e}"));
                    }
                }
            }
            LoadEvent::Groups {
                panel: kind, groups, ..
            } => {
                let panel = self.panel_mut(kind);
                panel.groups = Some(
                    groups
                        .into_iter()
                        .map(|(g, s)| (g, Arc::new(s)))
                        .collect(),
                );
                if panel.selection == Some(Selection::AllGroups) && !panel.session.is_running() {
                    panel.start_groups();
                }
            }
            LoadEvent::Cohorts { data, .. } => self.insights.set_data(data),
        }
    }
}
