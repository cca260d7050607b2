//! One reconciliation run: fetch, diff, add what is missing, report extras.
//!
//! Every state is visited at most once. Missing repositories are handled
//! one at a time in remote order so clone prompts never interleave.

use std::io::Write;
use std::path::PathBuf;

use crate::diff::diff;
use crate::error::SyncError;
use crate::git::Cloner;
use crate::model::{ProjectRecord, RemoteRepository, Visibility, now_rfc3339};
use crate::output::{Reporter, StepMessages};
use crate::prompt::Prompter;
use crate::remote::{Account, DEFAULT_REPO_LIMIT, REQUIRED_SCOPES, RemoteSource, verify_scopes};
use crate::resolve::{PathResolution, PathResolver};
use crate::store::{InsertOutcome, ProjectStore};

const ADD_PROMPT: &str = "Would you like to add these projects to the local db?";

const GET_USER: StepMessages<'static> = StepMessages {
    initial: "Getting GitHub user",
    success: "Got GitHub user",
    fail: "Failed to get GitHub user",
};

const GET_REPOS: StepMessages<'static> = StepMessages {
    initial: "Getting GitHub repos",
    success: "Got GitHub repos",
    fail: "Failed to get GitHub repos",
};

const GET_PROJECTS: StepMessages<'static> = StepMessages {
    initial: "Fetching db projects",
    success: "DB projects fetched",
    fail: "Failed to fetch db projects",
};

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum number of remote repositories to fetch.
    pub limit: usize,
    /// Clone without asking when no local folder matches.
    pub force: bool,
    /// Directory searched for checkouts and used as the clone target.
    pub work_dir: PathBuf,
}

impl ReconcileOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            limit: DEFAULT_REPO_LIMIT,
            force: false,
            work_dir: work_dir.into(),
        }
    }
}

/// Counters describing what a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Remote repositories without a stored project.
    pub missing: usize,
    /// Stored projects without a remote repository.
    pub extra: usize,
    pub added: usize,
    /// Subset of `added` that had to be cloned first.
    pub cloned: usize,
    pub skipped: usize,
    /// The user declined to add the missing projects at all.
    pub additions_declined: bool,
}

/// How a run ended when no fatal error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Local and remote sets matched; nothing else was done.
    NoDifferences,
    Reconciled(Summary),
}

enum AddOutcome {
    Added { cloned: bool },
    Skipped,
}

pub struct Reconciler<'a, W: Write> {
    remote: &'a dyn RemoteSource,
    store: &'a ProjectStore,
    prompter: &'a mut dyn Prompter,
    cloner: &'a dyn Cloner,
    reporter: &'a mut Reporter<W>,
    resolver: PathResolver,
    limit: usize,
}

impl<'a, W: Write> Reconciler<'a, W> {
    pub fn new(
        remote: &'a dyn RemoteSource,
        store: &'a ProjectStore,
        prompter: &'a mut dyn Prompter,
        cloner: &'a dyn Cloner,
        reporter: &'a mut Reporter<W>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            remote,
            store,
            prompter,
            cloner,
            reporter,
            resolver: PathResolver::new(options.work_dir, options.force),
            limit: options.limit,
        }
    }

    pub fn run(&mut self) -> Result<Outcome, SyncError> {
        let account = self.resolve_account()?;
        let repos = self.fetch_repositories(&account.login)?;
        let projects = self.fetch_projects()?;

        let diff = diff(&projects, &repos);
        if diff.is_empty() {
            self.reporter
                .success("✔", "No differences found between local db and GitHub.");
            return Ok(Outcome::NoDifferences);
        }

        let mut summary = Summary {
            missing: diff.missing.len(),
            extra: diff.extra.len(),
            ..Default::default()
        };

        if !diff.missing.is_empty() {
            self.add_missing(&diff.missing, &mut summary)?;
        }
        if !diff.extra.is_empty() {
            self.report_extra(&diff.extra);
        }

        Ok(Outcome::Reconciled(summary))
    }

    fn resolve_account(&mut self) -> Result<Account, SyncError> {
        let remote = self.remote;
        self.reporter.timed(GET_USER, || {
            let account = remote
                .resolve_account()
                .map_err(|e| SyncError::not_authenticated(format!("{e:#}")))?;
            if account.login.trim().is_empty() {
                return Err(SyncError::not_authenticated("No user logged in"));
            }
            verify_scopes(&account.scopes, REQUIRED_SCOPES)?;
            Ok(account)
        })
    }

    fn fetch_repositories(&mut self, login: &str) -> Result<Vec<RemoteRepository>, SyncError> {
        let remote = self.remote;
        let limit = self.limit;
        self.reporter.timed(GET_REPOS, || {
            remote
                .list_repositories(login, limit)
                .map_err(|source| SyncError::RemoteFetch {
                    account: login.to_string(),
                    source,
                })
        })
    }

    fn fetch_projects(&mut self) -> Result<Vec<ProjectRecord>, SyncError> {
        let store = self.store;
        let projects = self
            .reporter
            .timed(GET_PROJECTS, || store.read_all().map_err(SyncError::StoreRead))?;
        for project in projects
            .iter()
            .filter(|p| p.visibility == Visibility::Unknown)
        {
            self.reporter.warn(&format!(
                "Project {} has no recognized visibility in the local db",
                project.name
            ));
        }
        Ok(projects)
    }

    fn add_missing(
        &mut self,
        missing: &[RemoteRepository],
        summary: &mut Summary,
    ) -> Result<(), SyncError> {
        self.reporter.blank_line();
        self.reporter.warn(&format!(
            "Found {} projects on GitHub but not in local db.",
            missing.len()
        ));
        for repo in missing {
            self.reporter.detail(&repo.name);
        }

        let accepted = match self.prompter.confirm(ADD_PROMPT) {
            Ok(answer) => answer,
            Err(e) => {
                self.reporter
                    .warn_error("Could not read an answer; treating it as no.", &e);
                false
            }
        };
        if !accepted {
            self.reporter.note("Skipping adding projects to local db");
            summary.additions_declined = true;
            return Ok(());
        }

        self.reporter.blank_line();
        for repo in missing {
            match self.add_one(repo) {
                Ok(AddOutcome::Added { cloned }) => {
                    summary.added += 1;
                    if cloned {
                        summary.cloned += 1;
                    }
                }
                Ok(AddOutcome::Skipped) => summary.skipped += 1,
                Err(e) => match e.downcast::<SyncError>() {
                    Ok(fatal) => return Err(fatal),
                    Err(e) => {
                        self.reporter.warn_error(
                            &format!("Failed to add project {} to db. Skipping...", repo.name),
                            &e,
                        );
                        summary.skipped += 1;
                    }
                },
            }
        }

        self.reporter.note(&format!(
            "{} added, {} skipped",
            summary.added, summary.skipped
        ));
        Ok(())
    }

    /// Resolve and persist one repository.
    ///
    /// A clone failure comes back as a [`SyncError`] inside the error; every
    /// other error only skips this repository.
    fn add_one(&mut self, repo: &RemoteRepository) -> anyhow::Result<AddOutcome> {
        if self.store.contains_name(&repo.name)? {
            self.reporter.warn(&format!(
                "Project {} is already in the local db. Skipping...",
                repo.name
            ));
            return Ok(AddOutcome::Skipped);
        }

        let resolution = self.resolver.resolve(repo, self.prompter, self.cloner)?;
        let Some(path) = resolution.path() else {
            self.reporter.warn(&format!(
                "Failed to resolve path for project {}. Skipping...",
                repo.name
            ));
            return Ok(AddOutcome::Skipped);
        };

        let record = ProjectRecord::from_remote(repo, path, now_rfc3339());
        match self.store.insert(&record)? {
            InsertOutcome::Inserted => {
                self.reporter
                    .success("Added", &format!("{} ({})", repo.name, path.display()));
                Ok(AddOutcome::Added {
                    cloned: matches!(resolution, PathResolution::Cloned(_)),
                })
            }
            InsertOutcome::AlreadyPresent => {
                self.reporter.warn(&format!(
                    "Project {} is already in the local db. Skipping...",
                    repo.name
                ));
                Ok(AddOutcome::Skipped)
            }
        }
    }

    fn report_extra(&mut self, extra: &[ProjectRecord]) {
        self.reporter.warn(&format!(
            "Found {} projects in local db but not on GitHub.",
            extra.len()
        ));
        for project in extra {
            self.reporter.detail(&project.name);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Visibility;
    use crate::prompt::ScriptedPrompter;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    struct FakeRemote {
        account: Option<Account>,
        repos: Vec<RemoteRepository>,
        list_error: Option<String>,
        requested: RefCell<Vec<(String, usize)>>,
    }

    impl FakeRemote {
        fn with_repos(names: &[&str]) -> Self {
            Self {
                account: Some(Account {
                    login: "octocat".into(),
                    scopes: vec!["repo".into()],
                }),
                repos: names.iter().map(|n| remote_repo(n)).collect(),
                list_error: None,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl RemoteSource for FakeRemote {
        fn resolve_account(&self) -> Result<Account> {
            self.account
                .clone()
                .ok_or_else(|| anyhow::anyhow!("No user logged in to GitHub CLI"))
        }

        fn list_repositories(&self, login: &str, limit: usize) -> Result<Vec<RemoteRepository>> {
            self.requested.borrow_mut().push((login.to_string(), limit));
            if let Some(msg) = &self.list_error {
                anyhow::bail!("{msg}");
            }
            Ok(self.repos.clone())
        }
    }

    /// Creates the checkout folder on success so later runs find it.
    #[derive(Default)]
    struct FakeCloner {
        fail: bool,
        cloned: RefCell<Vec<String>>,
    }

    impl Cloner for FakeCloner {
        fn clone_repo(&self, url: &str, into: &Path) -> Result<()> {
            self.cloned.borrow_mut().push(url.to_string());
            if self.fail {
                anyhow::bail!("exit status: 128");
            }
            let name = url.rsplit('/').next().unwrap_or_default();
            std::fs::create_dir_all(into.join(name))?;
            Ok(())
        }
    }

    fn remote_repo(name: &str) -> RemoteRepository {
        RemoteRepository {
            name: name.to_string(),
            owner_id: "MDQ6VXNlcjE=".to_string(),
            size_kb: 5,
            url: format!("https://github.com/octocat/{name}"),
            visibility: Visibility::Public,
            created_at: "2020-01-01T00:00:00Z".to_string(),
        }
    }

    fn stored(name: &str) -> ProjectRecord {
        ProjectRecord::from_remote(
            &remote_repo(name),
            Path::new(&format!("/work/{name}")),
            "2024-01-01T00:00:00Z".to_string(),
        )
    }

    struct Harness {
        work: TempDir,
        store: ProjectStore,
        cloner: FakeCloner,
    }

    impl Harness {
        fn new(local: &[&str]) -> Self {
            let store = ProjectStore::open_in_memory().unwrap();
            for name in local {
                store.insert(&stored(name)).unwrap();
            }
            Self {
                work: TempDir::new().unwrap(),
                store,
                cloner: FakeCloner::default(),
            }
        }

        fn run(
            &self,
            remote: &FakeRemote,
            prompter: &mut ScriptedPrompter,
            force: bool,
        ) -> (Result<Outcome, SyncError>, String) {
            let mut reporter = Reporter::with_writer(Vec::new(), false);
            let mut options = ReconcileOptions::new(self.work.path());
            options.force = force;
            let result = Reconciler::new(
                remote,
                &self.store,
                prompter,
                &self.cloner,
                &mut reporter,
                options,
            )
            .run();
            (result, String::from_utf8(reporter.into_inner()).unwrap())
        }

        fn stored_names(&self) -> Vec<String> {
            self.store
                .read_all()
                .unwrap()
                .into_iter()
                .map(|p| p.name)
                .collect()
        }
    }

    #[test]
    fn test_identical_sets_short_circuit() {
        let h = Harness::new(&["a", "b"]);
        let remote = FakeRemote::with_repos(&["b", "a"]);
        let mut prompter = ScriptedPrompter::new([]);

        let (result, out) = h.run(&remote, &mut prompter, false);

        assert_eq!(result.unwrap(), Outcome::NoDifferences);
        assert!(out.contains("No differences found between local db and GitHub."));
        assert!(!out.contains("not on GitHub"));
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_requests_default_limit_for_login() {
        let h = Harness::new(&[]);
        let remote = FakeRemote::with_repos(&[]);
        let (result, _) = h.run(&remote, &mut ScriptedPrompter::new([]), false);
        assert_eq!(result.unwrap(), Outcome::NoDifferences);
        assert_eq!(
            remote.requested.borrow().as_slice(),
            [("octocat".to_string(), 1000)]
        );
    }

    #[test]
    fn test_missing_and_extra_reported_with_folder_match() {
        let h = Harness::new(&["A", "B"]);
        std::fs::create_dir(h.work.path().join("c")).unwrap();
        let remote = FakeRemote::with_repos(&["B", "C"]);
        let mut prompter = ScriptedPrompter::new([true]);

        let (result, out) = h.run(&remote, &mut prompter, false);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.extra, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.cloned, 0);
        assert_eq!(prompter.asked(), [ADD_PROMPT]);
        assert!(h.cloner.cloned.borrow().is_empty());

        let records = h.store.read_all().unwrap();
        let added = records.iter().find(|r| r.name == "C").unwrap();
        assert_eq!(added.path, h.work.path().join("c").to_string_lossy());
        assert!(added.submodule.is_empty());
        assert!(out.contains("Found 1 projects on GitHub but not in local db."));
        assert!(out.contains("Found 1 projects in local db but not on GitHub."));
    }

    #[test]
    fn test_declined_batch_persists_nothing_but_reports_extra() {
        let h = Harness::new(&["old"]);
        let remote = FakeRemote::with_repos(&["new"]);
        let mut prompter = ScriptedPrompter::new([false]);

        let (result, out) = h.run(&remote, &mut prompter, false);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert!(summary.additions_declined);
        assert_eq!(summary.added, 0);
        assert_eq!(h.stored_names(), vec!["old"]);
        assert!(out.contains("Skipping adding projects to local db"));
        assert!(out.contains("Found 1 projects in local db but not on GitHub."));
    }

    #[test]
    fn test_declined_clone_skips_record_without_error() {
        let h = Harness::new(&[]);
        let remote = FakeRemote::with_repos(&["C"]);
        let mut prompter = ScriptedPrompter::new([true, false]);

        let (result, out) = h.run(&remote, &mut prompter, false);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.skipped, 1);
        assert!(h.stored_names().is_empty());
        assert!(out.contains("Failed to resolve path for project C. Skipping..."));
        assert_eq!(prompter.asked().len(), 2);
    }

    #[test]
    fn test_accepted_clone_persists_constructed_path() {
        let h = Harness::new(&[]);
        let remote = FakeRemote::with_repos(&["widgets"]);
        let mut prompter = ScriptedPrompter::new([true, true]);

        let (result, _) = h.run(&remote, &mut prompter, false);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.added, 1);
        assert_eq!(summary.cloned, 1);
        let records = h.store.read_all().unwrap();
        assert_eq!(
            records[0].path,
            h.work.path().join("widgets").to_string_lossy()
        );
    }

    #[test]
    fn test_force_clones_without_clone_prompt() {
        let h = Harness::new(&[]);
        let remote = FakeRemote::with_repos(&["x", "y"]);
        let mut prompter = ScriptedPrompter::new([true]);

        let (result, _) = h.run(&remote, &mut prompter, true);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.cloned, 2);
        assert_eq!(prompter.asked(), [ADD_PROMPT]);
        assert_eq!(h.stored_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_clone_failure_is_fatal_and_keeps_earlier_inserts() {
        let mut h = Harness::new(&[]);
        std::fs::create_dir(h.work.path().join("first")).unwrap();
        h.cloner.fail = true;
        let remote = FakeRemote::with_repos(&["first", "second", "third"]);
        let mut prompter = ScriptedPrompter::new([true, true, true]);

        let (result, _) = h.run(&remote, &mut prompter, false);

        match result {
            Err(SyncError::Clone { url, .. }) => {
                assert_eq!(url, "https://github.com/octocat/second")
            }
            other => panic!("expected clone failure, got {other:?}"),
        }
        assert_eq!(h.stored_names(), vec!["first"]);
        assert_eq!(h.cloner.cloned.borrow().len(), 1);
    }

    #[test]
    fn test_non_fatal_error_skips_only_that_repository() {
        let h = Harness::new(&[]);
        std::fs::create_dir(h.work.path().join("b")).unwrap();
        let remote = FakeRemote::with_repos(&["a", "b"]);
        let mut reporter = Reporter::with_writer(Vec::new(), false);

        // Errors on the clone question for "a".
        struct FailingClonePrompt(ScriptedPrompter);
        impl Prompter for FailingClonePrompt {
            fn confirm(&mut self, prompt: &str) -> Result<bool> {
                if prompt.starts_with("Failed to resolve") {
                    anyhow::bail!("terminal went away");
                }
                self.0.confirm(prompt)
            }
        }
        let mut failing = FailingClonePrompt(ScriptedPrompter::new([true]));

        let result = Reconciler::new(
            &remote,
            &h.store,
            &mut failing,
            &h.cloner,
            &mut reporter,
            ReconcileOptions::new(h.work.path()),
        )
        .run();

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.stored_names(), vec!["b"]);
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("Failed to add project a to db. Skipping..."));
    }

    #[test]
    fn test_duplicate_remote_names_insert_once() {
        let h = Harness::new(&[]);
        std::fs::create_dir(h.work.path().join("dup")).unwrap();
        let remote = FakeRemote::with_repos(&["dup", "dup"]);

        let (result, out) = h.run(&remote, &mut ScriptedPrompter::new([true]), false);

        let Outcome::Reconciled(summary) = result.unwrap() else {
            panic!("expected reconciled outcome");
        };
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.stored_names(), vec!["dup"]);
        assert!(out.contains("Project dup is already in the local db. Skipping..."));
    }

    #[test]
    fn test_second_run_after_accepting_everything_is_clean() {
        let h = Harness::new(&[]);
        let remote = FakeRemote::with_repos(&["one", "two"]);

        let (first, _) = h.run(&remote, &mut ScriptedPrompter::new([true, true, true]), false);
        assert!(matches!(first.unwrap(), Outcome::Reconciled(_)));

        let (second, _) = h.run(&remote, &mut ScriptedPrompter::new([]), false);
        assert_eq!(second.unwrap(), Outcome::NoDifferences);
    }

    #[test]
    fn test_not_logged_in_is_fatal() {
        let h = Harness::new(&[]);
        let mut remote = FakeRemote::with_repos(&["a"]);
        remote.account = None;

        let (result, out) = h.run(&remote, &mut ScriptedPrompter::new([]), false);

        assert!(matches!(result, Err(SyncError::NotAuthenticated(_))));
        assert!(out.contains("Failed to get GitHub user"));
        assert!(remote.requested.borrow().is_empty());
    }

    #[test]
    fn test_missing_repo_scope_is_fatal() {
        let h = Harness::new(&[]);
        let mut remote = FakeRemote::with_repos(&["a"]);
        remote.account = Some(Account {
            login: "octocat".into(),
            scopes: vec!["gist".into()],
        });

        let (result, _) = h.run(&remote, &mut ScriptedPrompter::new([]), false);

        match result {
            Err(SyncError::MissingScopes(missing)) => assert_eq!(missing, vec!["repo"]),
            other => panic!("expected missing scopes, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_listing_failure_is_fatal() {
        let h = Harness::new(&["kept"]);
        let mut remote = FakeRemote::with_repos(&[]);
        remote.list_error = Some("HTTP 502".into());

        let (result, out) = h.run(&remote, &mut ScriptedPrompter::new([]), false);

        match result {
            Err(SyncError::RemoteFetch { account, .. }) => assert_eq!(account, "octocat"),
            other => panic!("expected remote fetch failure, got {other:?}"),
        }
        assert!(out.contains("Failed to get GitHub repos"));
        assert_eq!(h.stored_names(), vec!["kept"]);
    }

    #[test]
    fn test_only_extra_never_prompts() {
        let h = Harness::new(&["gone"]);
        let remote = FakeRemote::with_repos(&[]);
        let mut prompter = ScriptedPrompter::new([]);

        let (result, out) = h.run(&remote, &mut prompter, false);

        assert_eq!(
            result.unwrap(),
            Outcome::Reconciled(Summary {
                extra: 1,
                ..Default::default()
            })
        );
        assert!(prompter.asked().is_empty());
        assert!(out.contains("  gone"));
        assert_eq!(h.stored_names(), vec!["gone"]);
    }

    #[test]
    fn test_unrecognized_stored_visibility_warns_and_continues() {
        let h = Harness::new(&[]);
        let mut legacy = stored("legacy");
        legacy.visibility = Visibility::Unknown;
        h.store.insert(&legacy).unwrap();
        let remote = FakeRemote::with_repos(&["legacy"]);

        let (result, out) = h.run(&remote, &mut ScriptedPrompter::new([]), false);

        assert_eq!(result.unwrap(), Outcome::NoDifferences);
        assert!(out.contains("Project legacy has no recognized visibility in the local db"));
    }
}
