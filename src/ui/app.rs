use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};
use eframe::egui::{
    self, Align, Color32, Layout, RichText, ScrollArea, Sense, TextEdit, TopBottomPanel, Ui,
};
use tracing::debug;

use crate::clock::painter::PainterSurface;
use crate::clock::render::{AnalogClock, ClockTime, COMPLEMENT_SCALE, MAIN_SCALE};
use crate::router::{Navigator, Route};
use crate::session::events::{RequestEvent, SubscriptionId};
use crate::session::service::{SessionService, describe_failure};
use crate::ticker::TickService;
use crate::timezone::delta::{display_delta, parse_delta, wall_clock_at};
use crate::views::{
    EditorMode, LoginForm, RegisterForm, TimezoneEditor, TimezoneList, ViewContext, ViewError,
};

const ACCENT: Color32 = Color32::from_rgb(255, 197, 99);
const MUTED: Color32 = Color32::from_rgb(161, 180, 201);
const OK_COLOR: Color32 = Color32::from_rgb(111, 228, 134);
const ERROR_COLOR: Color32 = Color32::from_rgb(255, 124, 124);
const HEADER_CLOCK_SIZE: f32 = 36.0;
// route changes triggered while entering a route (login redirect, 401) settle within this many hops
const MAX_ROUTE_HOPS: usize = 4;

#[derive(Debug, Clone)]
pub struct GuiConfig {
    pub api_base: String,
    pub tick_interval: Duration,
    pub clock_size: f32,
}

pub fn run_gui(session: Arc<SessionService>, navigator: Navigator, config: GuiConfig) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Timezone Clock")
            .with_inner_size([960.0, 720.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Timezone Clock",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(TzClockApp::new(
                session,
                navigator,
                config,
                cc.egui_ctx.clone(),
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch timezone clock GUI: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(MAIN_SCALE[0]);
    visuals.panel_fill = MAIN_SCALE[4];
    visuals.window_fill = Color32::from_rgb(4, 24, 54);
    visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(4, 24, 54);
    visuals.widgets.inactive.bg_fill = MAIN_SCALE[3];
    visuals.widgets.hovered.bg_fill = MAIN_SCALE[2];
    visuals.widgets.active.bg_fill = MAIN_SCALE[1];
    visuals.selection.bg_fill = COMPLEMENT_SCALE[3];
    visuals.hyperlink_color = COMPLEMENT_SCALE[1];
    ctx.set_visuals(visuals);
}

enum RowAction {
    Edit(usize),
    Remove(usize),
}

struct TzClockApp {
    session: Arc<SessionService>,
    navigator: Navigator,
    api_base: String,
    clock: AnalogClock,
    header_clock: AnalogClock,
    latest_tick_ms: Arc<AtomicI64>,
    ticker: TickService,
    failure_listener: SubscriptionId,
    active_route: Option<Route>,
    login: LoginForm,
    register: RegisterForm,
    list: TimezoneList,
    editor: Option<TimezoneEditor>,
    status_message: Option<(String, Color32, Instant)>,
}

impl TzClockApp {
    fn new(
        session: Arc<SessionService>,
        navigator: Navigator,
        config: GuiConfig,
        ctx: egui::Context,
    ) -> Self {
        let latest_tick_ms = Arc::new(AtomicI64::new(Local::now().timestamp_millis()));
        let tick_sink = Arc::clone(&latest_tick_ms);
        let tick_ctx = ctx.clone();
        let ticker = TickService::new(config.tick_interval, move |now: DateTime<Local>| {
            tick_sink.store(now.timestamp_millis(), Ordering::Relaxed);
            tick_ctx.request_repaint();
        });
        ticker.resume();

        let failure_listener = session.events().subscribe(move |event| {
            if let RequestEvent::Failed(_) = event {
                ctx.request_repaint();
            }
        });
        debug!(listeners = session.events().len(), "request listeners installed");

        Self {
            session,
            navigator,
            api_base: config.api_base,
            clock: AnalogClock::new(config.clock_size),
            header_clock: AnalogClock::new(HEADER_CLOCK_SIZE),
            latest_tick_ms,
            ticker,
            failure_listener,
            active_route: None,
            login: LoginForm::default(),
            register: RegisterForm::default(),
            list: TimezoneList::default(),
            editor: None,
            status_message: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, color: Color32, ttl: Duration) {
        self.status_message = Some((text.into(), color, Instant::now() + ttl));
    }

    fn report(&mut self, result: Result<(), ViewError>) {
        if let Err(err) = result {
            self.set_status(err.to_string(), ERROR_COLOR, Duration::from_secs(5));
        }
    }

    fn latest_tick(&self) -> i64 {
        self.latest_tick_ms.load(Ordering::Relaxed)
    }

    /// Runs the on-enter work of whatever route the navigator now points at.
    fn sync_route(&mut self) {
        for _ in 0..MAX_ROUTE_HOPS {
            let route = self.navigator.current();
            if self.active_route.as_ref() == Some(&route) {
                return;
            }
            debug!(route = %route, "entering view");
            self.active_route = Some(route.clone());
            self.enter_route(&route);
        }
    }

    fn enter_route(&mut self, route: &Route) {
        let ctx = ViewContext::new(&self.session, &self.navigator);
        match route {
            Route::Login => {
                self.list = TimezoneList::default();
                self.editor = None;
                self.login.enter(ctx);
            }
            Route::Register => {}
            Route::TimezoneList { query } => {
                if self.list.query.trim() != query.as_deref().unwrap_or_default()
                    || self.list.timezones.is_empty()
                {
                    self.list = TimezoneList::new(query.clone());
                    let result = self.list.refresh(ctx);
                    self.report(result);
                }
            }
            Route::TimezoneCreate | Route::TimezoneEdit { .. } => {
                self.editor = TimezoneEditor::for_route(route);
                let result = match self.editor.as_mut() {
                    Some(editor) => editor.load(ctx),
                    None => Ok(()),
                };
                self.report(result);
            }
        }
    }

    fn show_header(&mut self, ui: &mut Ui) {
        let now = DateTime::from_timestamp_millis(self.latest_tick())
            .map(|utc| utc.with_timezone(&Local));
        let user = match self.session.get_user() {
            Ok(user) => user,
            Err(err) => {
                debug!(error = %err, "token claim unreadable");
                None
            }
        };

        let mut logout = false;
        ui.horizontal_wrapped(|ui| {
            ui.label(
                RichText::new("Timezone Clock")
                    .size(24.0)
                    .color(COMPLEMENT_SCALE[1])
                    .strong(),
            );
            ui.separator();
            paint_clock(ui, self.header_clock, Some(ClockTime::from(self.latest_tick())));
            if let Some(now) = now {
                ui.label(
                    RichText::new(now.format("%H:%M:%S").to_string())
                        .size(22.0)
                        .color(ACCENT)
                        .strong(),
                );
                ui.label(
                    RichText::new(now.format("%A, %B %d %Y").to_string())
                        .size(16.0)
                        .color(MUTED),
                );
            }
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if let Some(user) = &user {
                    if ui.button("Log out").clicked() {
                        logout = true;
                    }
                    ui.label(
                        RichText::new(format!("Signed in as {}", user.display_name()))
                            .color(OK_COLOR)
                            .strong(),
                    );
                }
            });
        });

        if logout {
            let ctx = ViewContext::new(&self.session, &self.navigator);
            let result = self.login.logout(ctx);
            self.list = TimezoneList::default();
            self.report(result);
        }

        if let Some((msg, color, _)) = &self.status_message {
            ui.label(RichText::new(msg).color(*color).strong());
        }
    }

    fn show_errors(&mut self, ui: &mut Ui) {
        let errors = self.session.errors();
        if errors.is_empty() {
            return;
        }
        ui.group(|ui| {
            for response in &errors {
                let text = match response.status {
                    0 => describe_failure(response),
                    status => format!("{status}: {}", describe_failure(response)),
                };
                ui.label(RichText::new(text).color(ERROR_COLOR));
            }
            if ui.small_button("Dismiss").clicked() {
                self.session.clear_errors();
            }
        });
        ui.add_space(6.0);
    }

    fn show_login(&mut self, ui: &mut Ui) {
        ui.heading(RichText::new("Log in").color(COMPLEMENT_SCALE[1]).strong());
        ui.add_space(6.0);

        let mut submit = false;
        let mut register = false;
        egui::Grid::new("login_grid").num_columns(2).show(ui, |ui| {
            ui.label("Login");
            ui.add(TextEdit::singleline(&mut self.login.login).desired_width(240.0));
            ui.end_row();
            ui.label("Password");
            let password = ui.add(
                TextEdit::singleline(&mut self.login.password)
                    .password(true)
                    .desired_width(240.0),
            );
            submit |= password.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            ui.end_row();
        });
        ui.checkbox(&mut self.login.remember, "Remember me");
        ui.horizontal(|ui| {
            submit |= ui
                .add(egui::Button::new(RichText::new("Log in").strong()))
                .clicked();
            register = ui.link("Create an account").clicked();
        });

        if submit {
            let ctx = ViewContext::new(&self.session, &self.navigator);
            let result = self.login.submit(ctx);
            self.report(result);
        }
        if register {
            self.navigator.navigate(Route::Register);
        }
    }

    fn show_register(&mut self, ui: &mut Ui) {
        ui.heading(RichText::new("Register").color(COMPLEMENT_SCALE[1]).strong());
        ui.add_space(6.0);

        let user = &mut self.register.user;
        egui::Grid::new("register_grid").num_columns(2).show(ui, |ui| {
            ui.label("Name");
            ui.text_edit_singleline(&mut user.name);
            ui.end_row();
            ui.label("Login");
            ui.text_edit_singleline(&mut user.login);
            ui.end_row();
            ui.label("Email");
            ui.text_edit_singleline(&mut user.email);
            ui.end_row();
            ui.label("Password");
            ui.add(TextEdit::singleline(&mut user.password).password(true));
            ui.end_row();
            ui.label("Repeat password");
            ui.add(TextEdit::singleline(&mut user.check_password).password(true));
            ui.end_row();
        });

        let mismatch = !user.check_password.is_empty() && user.password != user.check_password;
        if mismatch {
            ui.label(RichText::new("Passwords do not match").color(ERROR_COLOR));
        }

        let mut submit = false;
        let mut back = false;
        ui.horizontal(|ui| {
            submit = ui
                .add_enabled(!mismatch, egui::Button::new(RichText::new("Register").strong()))
                .clicked();
            back = ui.link("Back to log in").clicked();
        });

        if submit {
            let ctx = ViewContext::new(&self.session, &self.navigator);
            let result = self.register.submit(ctx);
            self.report(result);
        }
        if back {
            self.navigator.navigate(Route::Login);
        }
    }

    fn show_list(&mut self, ui: &mut Ui) {
        let mut search = false;
        let mut create = false;
        ui.horizontal(|ui| {
            ui.heading(RichText::new("Timezones").color(COMPLEMENT_SCALE[1]).strong());
            ui.separator();
            let query = ui.add(
                TextEdit::singleline(&mut self.list.query)
                    .hint_text("Filter by city")
                    .desired_width(220.0),
            );
            search |= query.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            search |= ui.button("Search").clicked();
            create = ui
                .add(egui::Button::new(RichText::new("New timezone").strong()))
                .clicked();
        });
        ui.add_space(4.0);

        let now_ms = self.latest_tick();
        let clock = self.clock;
        let mut action = None;
        if self.list.timezones.is_empty() {
            ui.label(RichText::new("No timezones yet.").color(MUTED));
        }
        ScrollArea::vertical()
            .id_salt("timezones_scroll")
            .show(ui, |ui| {
                egui::Grid::new("timezones_grid")
                    .striped(true)
                    .num_columns(6)
                    .spacing([18.0, 8.0])
                    .show(ui, |ui| {
                        ui.label(RichText::new("City").strong());
                        ui.label(RichText::new("Offset").strong());
                        ui.label(RichText::new("Time").strong());
                        ui.label(RichText::new("Clock").strong());
                        ui.label("");
                        ui.label("");
                        ui.end_row();

                        for (index, timezone) in self.list.timezones.iter().enumerate() {
                            let wall = wall_clock_at(now_ms, timezone.gmt_delta_seconds);
                            ui.label(RichText::new(&timezone.city).strong());
                            ui.label(
                                RichText::new(display_delta(timezone.gmt_delta_seconds))
                                    .monospace(),
                            );
                            ui.label(
                                RichText::new(match wall {
                                    Some(wall) => wall.format("%H:%M:%S").to_string(),
                                    None => "--:--:--".to_string(),
                                })
                                .monospace()
                                .color(ACCENT),
                            );
                            paint_clock(ui, clock, wall.map(ClockTime::from));
                            if ui.button("Edit").clicked() {
                                action = Some(RowAction::Edit(index));
                            }
                            if ui
                                .add(
                                    egui::Button::new(
                                        RichText::new("Delete").color(ERROR_COLOR).strong(),
                                    )
                                    .fill(Color32::from_rgb(51, 20, 24)),
                                )
                                .clicked()
                            {
                                action = Some(RowAction::Remove(index));
                            }
                            ui.end_row();
                        }
                    });
            });

        let ctx = ViewContext::new(&self.session, &self.navigator);
        let result = match action {
            Some(RowAction::Edit(index)) => {
                self.list.edit(index, ctx);
                Ok(())
            }
            Some(RowAction::Remove(index)) => self.list.remove(index, ctx).map(|removed| {
                if removed {
                    debug!(index, "timezone removed");
                }
            }),
            None => Ok(()),
        };
        let result = result.and_then(|()| {
            if search {
                self.list.refresh(ctx)?;
            }
            Ok(())
        });
        if create {
            self.list.create(ctx);
        }
        if search {
            self.active_route = Some(self.navigator.current());
        }
        self.report(result);
    }

    fn show_editor(&mut self, ui: &mut Ui) {
        let now_ms = self.latest_tick();
        let clock = self.clock;
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        let title = match editor.mode {
            EditorMode::Create => "New timezone".to_string(),
            EditorMode::Edit(id) => format!("Edit timezone #{id}"),
        };
        ui.heading(RichText::new(title).color(COMPLEMENT_SCALE[1]).strong());
        ui.add_space(6.0);
        if !editor.is_loaded() {
            ui.label(RichText::new("Loading...").color(MUTED));
        }

        let valid = editor.delta_validity();
        egui::Grid::new("editor_grid").num_columns(3).show(ui, |ui| {
            ui.label("City");
            ui.add(TextEdit::singleline(&mut editor.city).desired_width(240.0));
            ui.label("");
            ui.end_row();
            ui.label("GMT delta");
            ui.add(
                TextEdit::singleline(&mut editor.delta_text)
                    .hint_text("+5:30")
                    .desired_width(120.0)
                    .text_color(if valid { MAIN_SCALE[0] } else { ERROR_COLOR }),
            );
            ui.label(if valid {
                RichText::new("valid").color(OK_COLOR)
            } else {
                RichText::new("expected [+|-]H[H][:MM]").color(ERROR_COLOR)
            });
            ui.end_row();
        });

        if let Ok(delta) = parse_delta(&editor.delta_text) {
            let wall = wall_clock_at(now_ms, delta);
            ui.horizontal(|ui| {
                paint_clock(ui, clock, wall.map(ClockTime::from));
                if let Some(wall) = wall {
                    ui.label(
                        RichText::new(wall.format("%H:%M:%S").to_string())
                            .size(20.0)
                            .monospace()
                            .color(ACCENT),
                    );
                }
            });
        }

        let mut save = false;
        let mut cancel = false;
        ui.horizontal(|ui| {
            save = ui
                .add_enabled(valid, egui::Button::new(RichText::new("Save").strong()))
                .clicked();
            cancel = ui.button("Cancel").clicked();
        });

        if cancel {
            self.navigator.navigate(Route::TimezoneList { query: None });
        }
        if save {
            let ctx = ViewContext::new(&self.session, &self.navigator);
            let result = editor.save(ctx).map(|saved| {
                debug!(id = ?saved.id, "editor saved");
            });
            // the list reloads on entry so the saved row shows up
            self.list.timezones.clear();
            self.report(result);
        }
    }
}

impl Drop for TzClockApp {
    fn drop(&mut self) {
        self.session.events().unsubscribe(self.failure_listener);
    }
}

fn paint_clock(ui: &mut Ui, clock: AnalogClock, time: Option<ClockTime>) {
    let size = clock.size();
    let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), Sense::hover());
    let painter = ui.painter_at(rect);
    let mut surface = PainterSurface::new(&painter, rect, size, Color32::TRANSPARENT);
    clock.tick(&mut surface, time);
}

impl eframe::App for TzClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some((_, _, expires_at)) = &self.status_message
            && Instant::now() >= *expires_at
        {
            self.status_message = None;
        }

        self.sync_route();

        TopBottomPanel::top("header")
            .resizable(false)
            .show(ctx, |ui| self.show_header(ui));

        TopBottomPanel::bottom("footer")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(RichText::new(format!("API {}", self.api_base)).color(MUTED));
                    ui.separator();
                    ui.label(
                        RichText::new(format!(
                            "tick {} ms{}",
                            self.ticker.interval().as_millis(),
                            if self.ticker.is_running() { "" } else { " (paused)" }
                        ))
                        .color(MUTED),
                    );
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_errors(ui);
            match self.navigator.current() {
                Route::Login => self.show_login(ui),
                Route::Register => self.show_register(ui),
                Route::TimezoneList { .. } => self.show_list(ui),
                Route::TimezoneCreate | Route::TimezoneEdit { .. } => self.show_editor(ui),
            }
        });
    }
}
