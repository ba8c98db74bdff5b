mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use pathwise::catalog::mastery_of;
use pathwise::difficulty::StudyAdvice;
use pathwise::engine::Engine;
use pathwise::error::{EngineError, Result as EngineResult};
use pathwise::models::{MasteryState, PlanTopic, StudyPlan, Topic};
use pathwise::store::StudentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Mastery,
    Plan,
    TopicDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Mastery,
            View::Mastery => View::Plan,
            View::Plan => View::Dashboard,
            View::TopicDetail => View::TopicDetail,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Plan,
            View::Mastery => View::Dashboard,
            View::Plan => View::Mastery,
            View::TopicDetail => View::TopicDetail,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

/// A catalog topic with the student's current estimate.
#[derive(Debug, Clone)]
pub struct MasteryRow {
    pub topic: Topic,
    pub mastery: f64,
    pub state: Option<MasteryState>,
}

pub struct TopicDetail {
    pub topic: Topic,
    pub state: Option<MasteryState>,
    pub advice: StudyAdvice,
    pub plan_topic: Option<PlanTopic>,
    pub back_to: View,
}

pub struct App {
    pub student_id: String,
    pub view: View,
    pub mastery: StatefulList<MasteryRow>,
    pub plan: Option<StudyPlan>,
    pub plan_topics: StatefulList<PlanTopic>,
    pub todays: Vec<PlanTopic>,
    pub overdue: Vec<PlanTopic>,
    pub recommended: Vec<Topic>,
    pub next_topic: String,
    pub detail: Option<TopicDetail>,
    pub should_quit: bool,
}

// Minutes offered to the advisor when sizing the next activity.
const DETAIL_BUDGET_MINUTES: u32 = 60;

fn plan_or_none<T>(result: EngineResult<T>) -> EngineResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EngineError::PlanNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl App {
    pub fn new<S: StudentStore>(engine: &Engine<S>, student_id: &str) -> EngineResult<Self> {
        let mut app = Self {
            student_id: student_id.to_string(),
            view: View::Dashboard,
            mastery: StatefulList::with_items(Vec::new()),
            plan: None,
            plan_topics: StatefulList::with_items(Vec::new()),
            todays: Vec::new(),
            overdue: Vec::new(),
            recommended: Vec::new(),
            next_topic: String::new(),
            detail: None,
            should_quit: false,
        };
        app.refresh_data(engine)?;
        Ok(app)
    }

    pub fn refresh_data<S: StudentStore>(&mut self, engine: &Engine<S>) -> EngineResult<()> {
        let states = engine.get_mastery(&self.student_id)?;
        let map = engine.mastery_map(&self.student_id)?;
        let prior = engine.config().bkt.prior;

        let rows = engine
            .catalog()
            .topics()
            .iter()
            .map(|topic| MasteryRow {
                mastery: mastery_of(&map, &topic.id, prior),
                state: states.get(&topic.id).cloned(),
                topic: topic.clone(),
            })
            .collect();
        let selected = self.mastery.selected;
        self.mastery = StatefulList::with_items(rows);
        if selected.is_some_and(|i| i < self.mastery.items.len()) {
            self.mastery.selected = selected;
        }

        self.plan = plan_or_none(engine.get_plan(&self.student_id))?;
        let plan_items = self.plan.as_ref().map(|p| p.topics.clone()).unwrap_or_default();
        self.plan_topics = StatefulList::with_items(plan_items);
        self.todays = plan_or_none(engine.get_todays_topics(&self.student_id))?.unwrap_or_default();
        self.overdue = plan_or_none(engine.get_overdue_topics(&self.student_id))?.unwrap_or_default();

        self.recommended = engine.recommend(&self.student_id)?;
        self.next_topic = engine.select_optimal_topic(&self.student_id)?;

        if let Some(detail) = &self.detail {
            let (topic_id, back_to) = (detail.topic.id.clone(), detail.back_to);
            self.open_detail(engine, &topic_id, back_to)?;
        }
        Ok(())
    }

    fn open_detail<S: StudentStore>(
        &mut self,
        engine: &Engine<S>,
        topic_id: &str,
        back_to: View,
    ) -> EngineResult<()> {
        let topic = engine
            .catalog()
            .get(topic_id)
            .cloned()
            .ok_or_else(|| EngineError::TopicNotFound(topic_id.to_string()))?;
        let state = engine.get_mastery(&self.student_id)?.remove(topic_id);
        let advice = engine.advice(&self.student_id, topic_id, DETAIL_BUDGET_MINUTES)?;
        let plan_topic = self.plan.as_ref().and_then(|p| p.topic(topic_id)).cloned();

        self.detail = Some(TopicDetail {
            topic,
            state,
            advice,
            plan_topic,
            back_to,
        });
        self.view = View::TopicDetail;
        Ok(())
    }

    fn select<S: StudentStore>(&mut self, engine: &Engine<S>) -> EngineResult<()> {
        let topic_id = match self.view {
            View::Mastery => self.mastery.selected_item().map(|r| r.topic.id.clone()),
            View::Plan => self.plan_topics.selected_item().map(|t| t.topic_id.clone()),
            _ => None,
        };
        if let Some(id) = topic_id {
            let back_to = self.view;
            self.open_detail(engine, &id, back_to)?;
        }
        Ok(())
    }

    fn close_detail(&mut self) {
        if let Some(detail) = self.detail.take() {
            self.view = detail.back_to;
        }
    }

    fn current_list_next(&mut self) {
        match self.view {
            View::Mastery => self.mastery.next(),
            View::Plan => self.plan_topics.next(),
            _ => {}
        }
    }

    fn current_list_previous(&mut self) {
        match self.view {
            View::Mastery => self.mastery.previous(),
            View::Plan => self.plan_topics.previous(),
            _ => {}
        }
    }

    fn handle_key<S: StudentStore>(
        &mut self,
        engine: &Engine<S>,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> EngineResult<()> {
        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data(engine)?;
            }

            KeyCode::Esc => self.close_detail(),

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::TopicDetail => self.close_detail(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Mastery | View::Plan => self.select(engine)?,
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::BackTab => self.view = self.view.prev(),

            KeyCode::Char('j') | KeyCode::Down => self.current_list_next(),
            KeyCode::Char('k') | KeyCode::Up => self.current_list_previous(),

            KeyCode::Char('g') => match self.view {
                View::Mastery => self.mastery.first(),
                View::Plan => self.plan_topics.first(),
                _ => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Mastery => self.mastery.last(),
                View::Plan => self.plan_topics.last(),
                _ => {}
            },

            KeyCode::Enter => self.select(engine)?,

            _ => {}
        }
        Ok(())
    }
}

pub fn run<S: StudentStore>(engine: &Engine<S>, student_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(engine, student_id)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, engine, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app<S: StudentStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &Engine<S>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(engine, key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise::catalog::TopicCatalog;
    use pathwise::config::EngineConfig;
    use pathwise::models::{InteractionType, Metadata};
    use pathwise::scheduler::{PlanOptions, TopicRequest};
    use pathwise::store::MemoryStore;

    fn setup_engine() -> Engine<MemoryStore> {
        Engine::new(TopicCatalog::builtin(), EngineConfig::default(), MemoryStore::new())
    }

    fn press(app: &mut App, engine: &Engine<MemoryStore>, key: KeyCode) {
        app.handle_key(engine, key, KeyModifiers::NONE).unwrap();
    }

    mod stateful_list_tests {
        use super::*;

        #[test]
        fn empty_list_has_no_selection() {
            let mut list: StatefulList<u8> = StatefulList::with_items(vec![]);
            list.next();
            list.previous();
            list.last();
            assert!(list.selected.is_none());
        }

        #[test]
        fn wraps_in_both_directions() {
            let mut list = StatefulList::with_items(vec![1, 2, 3]);
            list.previous();
            assert_eq!(list.selected_item(), Some(&3));
            list.next();
            assert_eq!(list.selected_item(), Some(&1));
            list.last();
            assert_eq!(list.selected, Some(2));
            list.first();
            assert_eq!(list.selected, Some(0));
        }
    }

    mod app_tests {
        use super::*;

        #[test]
        fn loads_without_plan() {
            let engine = setup_engine();
            let app = App::new(&engine, "ada").unwrap();
            assert!(app.plan.is_none());
            assert!(app.todays.is_empty());
            assert_eq!(app.mastery.items.len(), engine.catalog().len());
            assert_eq!(app.next_topic, "fundamentals");
        }

        #[test]
        fn view_cycle() {
            let engine = setup_engine();
            let mut app = App::new(&engine, "ada").unwrap();
            press(&mut app, &engine, KeyCode::Char('l'));
            assert_eq!(app.view, View::Mastery);
            press(&mut app, &engine, KeyCode::Tab);
            assert_eq!(app.view, View::Plan);
            press(&mut app, &engine, KeyCode::Char('h'));
            assert_eq!(app.view, View::Mastery);
        }

        #[test]
        fn opens_and_closes_topic_detail() {
            let engine = setup_engine();
            engine
                .submit_interaction("ada", "algebra", true, InteractionType::Quiz, Metadata::new())
                .unwrap();
            let mut app = App::new(&engine, "ada").unwrap();
            app.view = View::Mastery;
            press(&mut app, &engine, KeyCode::Char('j'));
            press(&mut app, &engine, KeyCode::Enter);

            assert_eq!(app.view, View::TopicDetail);
            let detail = app.detail.as_ref().unwrap();
            assert_eq!(detail.topic.id, "algebra");
            assert_eq!(detail.state.as_ref().unwrap().attempts, 1);

            press(&mut app, &engine, KeyCode::Esc);
            assert_eq!(app.view, View::Mastery);
            assert!(app.detail.is_none());
        }

        #[test]
        fn refresh_picks_up_new_plan() {
            let engine = setup_engine();
            let mut app = App::new(&engine, "ada").unwrap();
            engine
                .create_plan("ada", &[TopicRequest::new("geometry")], &PlanOptions::default())
                .unwrap();
            app.handle_key(&engine, KeyCode::Char('r'), KeyModifiers::CONTROL).unwrap();
            assert_eq!(app.plan_topics.items.len(), 1);
            assert_eq!(app.todays.len(), 1);
        }
    }
}
