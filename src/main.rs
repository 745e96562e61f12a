use std::{
    env, fs,
    path::PathBuf,
    sync::mpsc::{Receiver, TryRecvError},
    time::{Duration, Instant},
};

use anyhow::Context;
use cassette_deck::{
    config::{Config, ConfigWatcher},
    init_logging,
    meta::PageMeta,
    preview::PreviewFactory,
    session::PlaylistRef,
    share::{ShareState, BACKGROUNDS, COVER_COUNT, PRESETS, SHELL_COLORS},
    spool::{ReelSpin, Spool, SpoolGeometry},
    sync::{PlayState, PlaybackSynchronizer, ProgressMode, SyncNotification},
    timer::SamplingPolicy,
};
use eframe::egui::{
    self, Align2, Color32, CornerRadius, FontId, LayerId, Pos2, Rect, Stroke, Vec2,
    ViewportBuilder, ViewportCommand,
};
use tracing::{info, warn};

const CASSETTE_MAX_WIDTH: f32 = 620.0;
const SPOKE_COUNT: usize = 6;
const SVG_EXPORT_FILE: &str = "spools.svg";

const SHELL_PALETTE: [Color32; 10] = [
    Color32::from_rgb(58, 110, 196),
    Color32::from_rgb(232, 128, 44),
    Color32::from_rgb(62, 64, 70),
    Color32::from_rgb(178, 182, 188),
    Color32::from_rgb(92, 168, 72),
    Color32::from_rgb(244, 206, 62),
    Color32::from_rgb(200, 52, 48),
    Color32::from_rgb(124, 78, 176),
    Color32::from_rgb(236, 142, 180),
    Color32::from_rgb(238, 226, 196),
];

const COVER_PALETTE: [Color32; 5] = [
    Color32::from_rgb(250, 246, 232),
    Color32::from_rgb(255, 214, 120),
    Color32::from_rgb(170, 220, 230),
    Color32::from_rgb(246, 176, 160),
    Color32::from_rgb(210, 236, 176),
];

const BACKGROUND_PALETTE: [Color32; 15] = [
    Color32::from_rgb(30, 30, 36),
    Color32::from_rgb(60, 60, 60),
    Color32::from_rgb(48, 56, 82),
    Color32::from_rgb(120, 60, 140),
    Color32::from_rgb(160, 40, 120),
    Color32::from_rgb(110, 72, 44),
    Color32::from_rgb(44, 66, 104),
    Color32::from_rgb(18, 10, 40),
    Color32::from_rgb(236, 236, 226),
    Color32::from_rgb(20, 20, 20),
    Color32::from_rgb(200, 190, 230),
    Color32::from_rgb(246, 236, 214),
    Color32::from_rgb(90, 100, 110),
    Color32::from_rgb(226, 226, 232),
    Color32::from_rgb(222, 234, 240),
];

fn palette_color(palette: &[Color32], index: u8) -> Color32 {
    let idx = usize::from(index.max(1) - 1).min(palette.len() - 1);
    palette[idx]
}

fn is_dark_color(color: Color32) -> bool {
    let [r, g, b, _] = color.to_array();
    let luminance = 0.2126 * (r as f32) + 0.7152 * (g as f32) + 0.0722 * (b as f32);
    luminance < 128.0
}

fn format_percent(progress: f32) -> String {
    format!("{:.0}%", progress.clamp(0.0, 100.0))
}

/// Maps scene coordinates onto a screen rect, keeping the aspect ratio.
#[derive(Debug, Clone, Copy)]
struct SceneTransform {
    origin: Pos2,
    scale: f32,
}

impl SceneTransform {
    fn fit(rect: Rect, canvas: Vec2) -> Self {
        let scale = (rect.width() / canvas.x).min(rect.height() / canvas.y).max(0.01);
        let used = canvas * scale;
        let origin = rect.center() - used * 0.5;
        Self { origin, scale }
    }

    fn point(&self, p: Pos2) -> Pos2 {
        self.origin + p.to_vec2() * self.scale
    }

    fn length(&self, len: f32) -> f32 {
        len * self.scale
    }
}

struct App {
    config: Config,
    config_watcher: Option<ConfigWatcher>,
    deck: PlaybackSynchronizer<PreviewFactory>,
    deck_rx: Receiver<SyncNotification>,
    share: ShareState,
    rng: fastrand::Rng,
    playlist_input: String,
    err: Option<String>,
    notice: Option<String>,
    spin: ReelSpin,
    spin_last_frame: Option<Instant>,
    last_title: Option<String>,
}

impl App {
    fn new(config: Config, link: Option<&str>) -> Self {
        let mut rng = fastrand::Rng::new();
        let share = match link {
            Some(link) => ShareState::from_link(link, &mut rng),
            None => ShareState::random_preset(&mut rng),
        };

        let mut deck = PlaybackSynchronizer::with_policy(
            PreviewFactory,
            SamplingPolicy::from_config(&config.playback),
            config.playback.progress_mode,
        );
        deck.set_geometry(SpoolGeometry::from_config(&config.spool));
        let deck_rx = deck.subscribe();

        let config_watcher = config.source.as_ref().and_then(|path| {
            ConfigWatcher::watch(path)
                .map_err(|err| warn!(%err, "config hot reload unavailable"))
                .ok()
        });

        let mut app = Self {
            config,
            config_watcher,
            deck,
            deck_rx,
            playlist_input: share.playlist.clone().unwrap_or_default(),
            share,
            rng,
            err: None,
            notice: None,
            spin: ReelSpin::new(),
            spin_last_frame: None,
            last_title: None,
        };

        if let Some(playlist) = app.share.playlist.clone() {
            let start_item = app.share.start_item.clone();
            app.load_playlist(PlaylistRef {
                playlist_id: playlist,
                start_item,
            });
        }

        app
    }

    fn load_playlist(&mut self, playlist: PlaylistRef) {
        self.share.set_playlist(Some(playlist.clone()));
        match self.deck.load(playlist) {
            Ok(()) => self.err = None,
            Err(err) => self.err = Some(err.to_string()),
        }
    }

    fn apply_config(&mut self, config: Config) {
        self.deck
            .set_sampling_policy(SamplingPolicy::from_config(&config.playback));
        self.deck.set_progress_mode(config.playback.progress_mode);
        self.deck
            .set_geometry(SpoolGeometry::from_config(&config.spool));
        self.config = Config {
            source: self.config.source.clone(),
            ..config
        };
        info!("config reloaded");
    }

    fn maintain_config_watcher(&mut self) {
        let Some(result) = self.config_watcher.as_ref().and_then(ConfigWatcher::poll) else {
            return;
        };
        match result {
            Ok(config) => self.apply_config(config),
            Err(err) => {
                warn!(%err, "config reload failed");
                self.err = Some(format!("{err:#}"));
            }
        }
    }

    fn drain_deck_notifications(&mut self) {
        loop {
            match self.deck_rx.try_recv() {
                Ok(SyncNotification::PlayerFailed(code)) => {
                    self.err = Some(format!("Player error: {code}"));
                }
                Ok(SyncNotification::SessionChanged(_)) => {
                    self.spin.reset();
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn page_meta(&self) -> PageMeta {
        let page_url = self
            .share
            .to_url(&self.config.share.base_url)
            .map(String::from)
            .unwrap_or_default();
        PageMeta::new(
            &self.config.share,
            self.share.label.clone(),
            format!("A {} cassette mixtape", self.share.shell_name()),
            self.share.preview_image_path(),
            page_url,
        )
        .with_video_title(self.deck.now_playing())
    }

    fn update_window_title(&mut self, ctx: &egui::Context) {
        let title = self.page_meta().full_title();
        if self.last_title.as_deref() != Some(title.as_str()) {
            ctx.send_viewport_cmd(ViewportCommand::Title(title.clone()));
            self.last_title = Some(title);
        }
    }

    fn desired_repaint_interval(&self) -> Duration {
        if self.deck.play_state() == PlayState::Playing {
            Duration::from_millis(16)
        } else {
            Duration::from_millis(250)
        }
    }

    fn export_svg(&self) -> anyhow::Result<PathBuf> {
        let path = env::current_dir()
            .context("Failed to resolve working directory")?
            .join(SVG_EXPORT_FILE);
        fs::write(&path, self.deck.spool_scene().to_svg())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn render_cassette(&mut self, ui: &mut egui::Ui) {
        let width = ui.available_width().min(CASSETTE_MAX_WIDTH).max(200.0);
        let scene = self.deck.spool_scene();
        let height = width * scene.canvas.y / scene.canvas.x;
        let (rect, _) = ui.allocate_exact_size(egui::vec2(width, height), egui::Sense::hover());
        let transform = SceneTransform::fit(rect, scene.canvas);

        let now = Instant::now();
        let dt = self
            .spin_last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0)
            .min(0.25);
        self.spin_last_frame = Some(now);
        let spinning = self.deck.play_state() == PlayState::Playing;
        self.spin.advance(dt, spinning, &scene);

        let painter = ui.painter_at(rect);
        let shell = palette_color(&SHELL_PALETTE, self.share.shell);
        let cover = palette_color(&COVER_PALETTE, self.share.cover);
        let window = Color32::from_rgba_unmultiplied(20, 16, 14, 230);

        let shell_rect = Rect::from_min_size(transform.origin, scene.canvas * transform.scale);
        painter.rect_filled(shell_rect, CornerRadius::same(18), shell);

        let label_rect = Rect::from_min_max(
            transform.point(Pos2::new(40.0, 16.0)),
            transform.point(Pos2::new(660.0, 72.0)),
        );
        painter.rect_filled(label_rect, CornerRadius::same(6), cover);
        painter.text(
            label_rect.center(),
            Align2::CENTER_CENTER,
            &self.share.label,
            FontId::proportional(transform.length(30.0).max(10.0)),
            Color32::from_rgb(40, 32, 28),
        );

        let window_rect = Rect::from_min_max(
            transform.point(Pos2::new(30.0, 40.0)),
            transform.point(Pos2::new(670.0, 340.0)),
        );
        painter.rect_filled(
            window_rect.shrink(transform.length(4.0)),
            CornerRadius::same(10),
            window.gamma_multiply(0.35),
        );

        for spool in scene.spools() {
            self.paint_spool(&painter, &transform, spool, window);
        }

        let text_color = if is_dark_color(shell) {
            Color32::WHITE
        } else {
            Color32::BLACK
        };
        painter.text(
            transform.point(Pos2::new(350.0, 360.0)),
            Align2::CENTER_CENTER,
            self.deck.now_playing().unwrap_or("Insert a playlist"),
            FontId::proportional(transform.length(20.0).max(9.0)),
            text_color,
        );
    }

    fn paint_spool(
        &self,
        painter: &egui::Painter,
        transform: &SceneTransform,
        spool: &Spool,
        hole_fill: Color32,
    ) {
        let center = transform.point(spool.center);
        let edge = Stroke::new(transform.length(spool.edge_width), Color32::from_rgb(28, 19, 14));
        painter.circle_filled(
            center,
            transform.length(spool.tape_radius),
            Color32::from_rgb(59, 42, 32),
        );
        painter.circle_stroke(center, transform.length(spool.tape_radius), edge);
        painter.circle_filled(
            center,
            transform.length(spool.rim_radius),
            Color32::from_rgb(243, 239, 230),
        );
        painter.circle_stroke(
            center,
            transform.length(spool.rim_edge_radius()),
            Stroke::new(transform.length(spool.edge_width), Color32::from_rgb(183, 174, 159)),
        );
        painter.circle_filled(center, transform.length(spool.hole_radius), hole_fill);

        let angle = self.spin.angle(spool.side);
        let spoke = Stroke::new(transform.length(4.0), Color32::from_rgb(243, 239, 230));
        let inner = transform.length(spool.hole_radius * 0.35);
        let outer = transform.length(spool.hole_radius);
        for i in 0..SPOKE_COUNT {
            let theta = angle + i as f32 * std::f32::consts::TAU / SPOKE_COUNT as f32;
            let dir = egui::vec2(theta.cos(), theta.sin());
            painter.line_segment([center + dir * inner, center + dir * outer], spoke);
        }
    }

    fn render_transport(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|row| {
            let previous = row
                .add_enabled(self.deck.has_previous(), egui::Button::new("⏮"))
                .on_hover_text("Previous track");
            if previous.clicked() {
                self.deck.previous();
            }

            let is_playing = self.deck.play_state() == PlayState::Playing;
            let (glyph, hint) = if is_playing {
                ("⏸", "Pause")
            } else {
                ("▶", "Play")
            };
            let toggle = row
                .add_enabled(self.deck.controls_enabled(), egui::Button::new(glyph))
                .on_hover_text(hint);
            if toggle.clicked() {
                self.deck.toggle();
            }

            let next = row
                .add_enabled(self.deck.has_next(), egui::Button::new("⏭"))
                .on_hover_text("Next track");
            if next.clicked() {
                self.deck.next();
            }

            if self.deck.playlist_length() > 0 {
                row.label(format!(
                    "{}/{}",
                    self.deck.current_index() + 1,
                    self.deck.playlist_length()
                ));
            }
        });

        ui.add(
            egui::ProgressBar::new(self.deck.progress() / 100.0)
                .text(format_percent(self.deck.progress())),
        );
    }

    fn render_playlist_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|row| {
            row.label("Playlist");
            let response = row.add(
                egui::TextEdit::singleline(&mut self.playlist_input)
                    .hint_text("Paste a playlist link or id"),
            );
            let submitted =
                response.lost_focus() && row.input(|i| i.key_pressed(egui::Key::Enter));
            if row.button("Load").clicked() || submitted {
                match PlaylistRef::parse(&self.playlist_input) {
                    Some(playlist) => self.load_playlist(playlist),
                    None if self.playlist_input.trim().is_empty() => {
                        self.share.set_playlist(None);
                        self.deck.teardown();
                    }
                    None => self.err = Some("That does not look like a playlist link.".into()),
                }
            }
        });
    }

    fn render_look_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|row| {
            row.label("Label");
            row.text_edit_singleline(&mut self.share.label);
        });

        ui.horizontal(|row| {
            row.label("Cover");
            for n in 1..=COVER_COUNT {
                row.selectable_value(&mut self.share.cover, n, n.to_string());
            }
        });

        ui.horizontal(|row| {
            egui::ComboBox::from_label("Shell")
                .selected_text(self.share.shell_name())
                .show_ui(row, |menu| {
                    for (i, name) in SHELL_COLORS.iter().enumerate() {
                        menu.selectable_value(&mut self.share.shell, (i + 1) as u8, *name);
                    }
                });
            egui::ComboBox::from_label("Background")
                .selected_text(self.share.background_name())
                .show_ui(row, |menu| {
                    for (i, name) in BACKGROUNDS.iter().enumerate() {
                        menu.selectable_value(&mut self.share.background, (i + 1) as u8, *name);
                    }
                });
        });

        ui.horizontal(|row| {
            let mut chosen = None;
            egui::ComboBox::from_id_salt("example_tapes")
                .selected_text("Example tapes")
                .show_ui(row, |menu| {
                    for preset in PRESETS.iter() {
                        if menu.selectable_label(false, preset.name).clicked() {
                            chosen = Some(*preset);
                        }
                    }
                });
            if let Some(preset) = chosen {
                self.share.apply_preset(&preset);
            }
            if row.button("🎲 Randomize all").clicked() {
                self.share.randomize(&mut self.rng);
            }
        });
    }

    fn render_settings(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("Settings", |section| {
            let mut low_power = self.deck.sampling_policy().prefer_low_power;
            if section
                .checkbox(&mut low_power, "Low power sampling")
                .changed()
            {
                let policy = SamplingPolicy {
                    prefer_low_power: low_power,
                    ..self.deck.sampling_policy().clone()
                };
                self.deck.set_sampling_policy(policy);
            }

            let mut mode = self.deck.progress_mode();
            egui::ComboBox::from_label("Progress")
                .selected_text(match mode {
                    ProgressMode::PerItem => "Per track",
                    ProgressMode::WholePlaylist => "Whole playlist",
                })
                .show_ui(section, |menu| {
                    menu.selectable_value(&mut mode, ProgressMode::PerItem, "Per track");
                    menu.selectable_value(&mut mode, ProgressMode::WholePlaylist, "Whole playlist");
                });
            self.deck.set_progress_mode(mode);

            if let Some(watcher) = &self.config_watcher {
                section.small(format!("Watching {}", watcher.path().display()));
            }
        });
    }

    fn render_share(&mut self, ui: &mut egui::Ui) {
        let link = self.share.to_url(&self.config.share.base_url);
        ui.horizontal(|row| {
            match &link {
                Ok(url) => {
                    if row.button("Copy share link").clicked() {
                        row.ctx().copy_text(url.to_string());
                        self.notice = Some("Share link copied.".into());
                    }
                }
                Err(err) => {
                    row.colored_label(Color32::from_rgb(240, 200, 80), err.to_string());
                }
            }
            if row.button("Copy preview tags").clicked() {
                row.ctx().copy_text(self.page_meta().render_tags());
                self.notice = Some("Preview tags copied.".into());
            }
            if row.button("Export SVG").clicked() {
                match self.export_svg() {
                    Ok(path) => self.notice = Some(format!("Wrote {}", path.display())),
                    Err(err) => self.err = Some(format!("{err:#}")),
                }
            }
        });
        if let Ok(url) = &link {
            ui.small(url.as_str());
        }
    }

    fn render_messages(&mut self, ui: &mut egui::Ui) {
        if let Some(err) = &self.err {
            ui.colored_label(Color32::from_rgb(240, 200, 80), err);
        }
        if let Some(notice) = &self.notice {
            ui.small(notice);
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.maintain_config_watcher();
        self.deck.pump_events();
        self.deck.advance(Instant::now());
        self.drain_deck_notifications();
        self.update_window_title(ctx);

        let root_rect = ctx.screen_rect();
        let background = palette_color(&BACKGROUND_PALETTE, self.share.background);
        ctx.layer_painter(LayerId::background())
            .rect_filled(root_rect, CornerRadius::same(0), background);

        let mut panel_frame = egui::Frame::central_panel(&ctx.style());
        panel_frame.fill = Color32::TRANSPARENT;

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                ui.spacing_mut().item_spacing.y = 10.0;
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.vertical_centered(|column| {
                        self.render_cassette(column);
                    });
                    self.render_transport(ui);
                    self.render_playlist_controls(ui);
                    ui.separator();
                    self.render_look_controls(ui);
                    self.render_share(ui);
                    self.render_settings(ui);
                    self.render_messages(ui);
                });
            });

        ctx.request_repaint_after(self.desired_repaint_interval());
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::load().unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "falling back to default config");
        Config::default()
    });
    let link = env::args().nth(1);

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([720.0, 760.0])
            .with_title("Cassette Deck"),
        ..Default::default()
    };
    let run_res = eframe::run_native(
        "Cassette Deck",
        native_options,
        Box::new(
            move |_cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(App::new(config, link.as_deref()))) },
        ),
    );
    if let Err(e) = run_res {
        return Err(Box::new(e));
    }

    Ok(())
}
