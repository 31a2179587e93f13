use thiserror::Error;
use tracing::{debug, info};

use crate::router::{Navigator, Route};
use crate::session::service::{RequestError, SessionService};
use crate::timezone::delta::{DeltaError, format_delta, parse_delta};
use crate::timezone::model::{NewUser, Timezone};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("city is required")]
    EmptyCity,
    #[error(transparent)]
    Delta(#[from] DeltaError),
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Validation(#[from] FormError),
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// What every view action needs: the session and the shared route.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub session: &'a SessionService,
    pub navigator: &'a Navigator,
}

impl<'a> ViewContext<'a> {
    pub fn new(session: &'a SessionService, navigator: &'a Navigator) -> Self {
        Self { session, navigator }
    }

    fn go_to_list(&self) {
        self.navigator.navigate(Route::TimezoneList { query: None });
    }
}

fn require(value: &str, field: &'static str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::Missing(field));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
    pub remember: bool,
}

impl LoginForm {
    /// Skips the form entirely for an already logged-in user.
    pub fn enter(&self, ctx: ViewContext<'_>) -> bool {
        if ctx.session.is_logged_in() {
            ctx.go_to_list();
            return true;
        }
        false
    }

    pub fn submit(&mut self, ctx: ViewContext<'_>) -> Result<(), ViewError> {
        ctx.session.clear_errors();
        require(&self.login, "login")?;
        require(&self.password, "password")?;
        ctx.session
            .login(self.login.trim(), &self.password, self.remember)?;
        self.password.clear();
        ctx.go_to_list();
        Ok(())
    }

    pub fn logout(&mut self, ctx: ViewContext<'_>) -> Result<(), ViewError> {
        ctx.session.logout().map_err(RequestError::from)?;
        self.password.clear();
        ctx.navigator.navigate(Route::Login);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub user: NewUser,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.user.login, "login")?;
        require(&self.user.password, "password")?;
        if self.user.password != self.user.check_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    /// Registers, then logs the new account in and opens the list.
    pub fn submit(&mut self, ctx: ViewContext<'_>) -> Result<(), ViewError> {
        ctx.session.clear_errors();
        self.validate()?;
        ctx.session.register_user(&self.user)?;
        info!(login = %self.user.login, "registered user");
        ctx.session
            .login(self.user.login.trim(), &self.user.password, false)?;
        self.user = NewUser::default();
        ctx.go_to_list();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimezoneList {
    pub query: String,
    pub timezones: Vec<Timezone>,
}

impl TimezoneList {
    pub fn new(query: Option<String>) -> Self {
        Self {
            query: query.unwrap_or_default(),
            timezones: Vec::new(),
        }
    }

    fn query_filter(&self) -> Option<String> {
        let query = self.query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }

    /// Fetches the filtered rows and keeps the filter in the route.
    pub fn refresh(&mut self, ctx: ViewContext<'_>) -> Result<(), ViewError> {
        let query = self.query_filter();
        let timezones = ctx.session.list(query.as_deref())?;
        debug!(rows = timezones.len(), query = ?query, "timezones listed");
        self.timezones = timezones;
        ctx.navigator.navigate(Route::TimezoneList { query });
        Ok(())
    }

    pub fn edit(&self, index: usize, ctx: ViewContext<'_>) -> bool {
        match self.timezones.get(index).and_then(|timezone| timezone.id) {
            Some(id) => {
                ctx.navigator.navigate(Route::TimezoneEdit { id });
                true
            }
            None => false,
        }
    }

    /// Deletes the row on the server, then drops it locally. Returns `false`
    /// for an index with no saved row.
    pub fn remove(&mut self, index: usize, ctx: ViewContext<'_>) -> Result<bool, ViewError> {
        let Some(id) = self.timezones.get(index).and_then(|timezone| timezone.id) else {
            return Ok(false);
        };
        ctx.session.remove(id)?;
        self.timezones.remove(index);
        Ok(true)
    }

    pub fn create(&self, ctx: ViewContext<'_>) {
        ctx.navigator.navigate(Route::TimezoneCreate);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(i64),
}

#[derive(Debug, Clone)]
pub struct TimezoneEditor {
    pub mode: EditorMode,
    pub city: String,
    pub delta_text: String,
    loaded: bool,
}

impl TimezoneEditor {
    pub fn create() -> Self {
        Self {
            mode: EditorMode::Create,
            city: String::new(),
            delta_text: String::new(),
            loaded: true,
        }
    }

    pub fn edit(id: i64) -> Self {
        Self {
            mode: EditorMode::Edit(id),
            city: String::new(),
            delta_text: String::new(),
            loaded: false,
        }
    }

    pub fn for_route(route: &Route) -> Option<Self> {
        match route {
            Route::TimezoneCreate => Some(Self::create()),
            Route::TimezoneEdit { id } => Some(Self::edit(*id)),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn load(&mut self, ctx: ViewContext<'_>) -> Result<(), ViewError> {
        let EditorMode::Edit(id) = self.mode else {
            self.loaded = true;
            return Ok(());
        };
        let timezone = ctx.session.get(id)?;
        self.city = timezone.city;
        self.delta_text = format_delta(timezone.gmt_delta_seconds);
        self.loaded = true;
        Ok(())
    }

    pub fn delta_validity(&self) -> bool {
        parse_delta(&self.delta_text).is_ok()
    }

    pub fn to_timezone(&self) -> Result<Timezone, FormError> {
        let city = self.city.trim();
        if city.is_empty() {
            return Err(FormError::EmptyCity);
        }
        let mut timezone = Timezone::new(city, parse_delta(&self.delta_text)?);
        if let EditorMode::Edit(id) = self.mode {
            timezone.id = Some(id);
        }
        Ok(timezone)
    }

    /// Invalid input never reaches the server.
    pub fn save(&mut self, ctx: ViewContext<'_>) -> Result<Timezone, ViewError> {
        ctx.session.clear_errors();
        let timezone = self.to_timezone()?;
        let saved = match self.mode {
            EditorMode::Create => ctx.session.create(&timezone)?,
            EditorMode::Edit(_) => ctx.session.update(&timezone)?,
        };
        info!(city = %saved.city, delta = saved.gmt_delta_seconds, "timezone saved");
        ctx.go_to_list();
        Ok(saved)
    }
}
