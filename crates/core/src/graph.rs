//! Task dependency graph
//!
//! Tasks are registered one by one and kept in registration order. Dependency
//! names are only checked when a closure is resolved, so tasks may reference
//! dependencies registered after them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;
use tracing::debug;

use crate::tasks::Task;
use crate::types::{DocbuildError, DocbuildResult};

#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    output_owners: HashMap<PathBuf, String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single task. On error the graph is left unchanged.
    pub fn register_task(&mut self, task: Task) -> DocbuildResult<()> {
        self.validate(&task)?;
        self.insert(task);
        Ok(())
    }

    /// Register a batch of tasks atomically: if any of them collides with an
    /// existing task or with another task of the batch, none is registered.
    pub fn register_all(&mut self, tasks: Vec<Task>) -> DocbuildResult<()> {
        let mut names = HashSet::new();
        let mut outputs: HashMap<PathBuf, &str> = HashMap::new();
        for task in &tasks {
            self.validate(task)?;
            if !names.insert(task.name.as_str()) {
                return Err(DocbuildError::DuplicateTask(task.name.clone()));
            }
            for path in task.outputs.iter().filter_map(|a| a.literal_path()) {
                if let Some(owner) = outputs.insert(path.to_path_buf(), &task.name) {
                    return Err(DocbuildError::OutputConflict {
                        path: path.to_path_buf(),
                        task: task.name.clone(),
                        owner: owner.to_string(),
                    });
                }
            }
        }

        for task in tasks {
            self.insert(task);
        }
        Ok(())
    }

    fn validate(&self, task: &Task) -> DocbuildResult<()> {
        if self.index.contains_key(&task.name) {
            return Err(DocbuildError::DuplicateTask(task.name.clone()));
        }
        for path in task.outputs.iter().filter_map(|a| a.literal_path()) {
            if let Some(owner) = self.output_owners.get(path) {
                return Err(DocbuildError::OutputConflict {
                    path: path.to_path_buf(),
                    task: task.name.clone(),
                    owner: owner.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, task: Task) {
        for path in task.outputs.iter().filter_map(|a| a.literal_path()) {
            self.output_owners
                .insert(path.to_path_buf(), task.name.clone());
        }
        debug!(task = %task.name, "registered task");
        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Tasks in registration order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks required by `roots`, dependencies first.
    ///
    /// The order is a depth-first postorder over dependencies in declaration
    /// order, starting from the roots in the order given, so it is stable for
    /// a given registration.
    pub fn resolve_dependency_closure<S: AsRef<str>>(
        &self,
        roots: &[S],
    ) -> DocbuildResult<Vec<&Task>> {
        let reachable = self.reachable_from(roots)?;

        if let Some(cycle) = self.find_cycles(&reachable).into_iter().next() {
            return Err(DocbuildError::CycleDetected(cycle));
        }

        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(reachable.len());
        for root in roots {
            self.postorder(self.index[root.as_ref()], &mut visited, &mut ordered);
        }

        Ok(ordered.into_iter().map(|i| &self.tasks[i]).collect())
    }

    fn postorder(&self, node: usize, visited: &mut HashSet<usize>, ordered: &mut Vec<usize>) {
        if !visited.insert(node) {
            return;
        }
        for dep in &self.tasks[node].depends_on {
            self.postorder(self.index[dep.as_str()], visited, ordered);
        }
        ordered.push(node);
    }

    /// Indices of every task reachable from `roots`, checking that all names exist
    fn reachable_from<S: AsRef<str>>(&self, roots: &[S]) -> DocbuildResult<Vec<usize>> {
        let mut queue = VecDeque::new();
        for root in roots {
            let node = self
                .index
                .get(root.as_ref())
                .ok_or_else(|| DocbuildError::UnknownTask(root.as_ref().to_string()))?;
            queue.push_back(*node);
        }

        let mut seen = HashSet::new();
        let mut reachable = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            reachable.push(node);

            let task = &self.tasks[node];
            for dep in &task.depends_on {
                match self.index.get(dep) {
                    Some(&dep_node) => queue.push_back(dep_node),
                    None => {
                        debug!(task = %task.name, dependency = %dep, "unknown dependency");
                        return Err(DocbuildError::UnknownTask(dep.clone()));
                    }
                }
            }
        }
        reachable.sort_unstable();
        Ok(reachable)
    }

    /// Cycles among `nodes`, each as a path of task names starting at the
    /// earliest registered member
    fn find_cycles(&self, nodes: &[usize]) -> Vec<Vec<String>> {
        let graph = self.dependency_graph_of(nodes);

        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter_map(|component| {
                if component.len() == 1 && !graph.contains_edge(component[0], component[0]) {
                    return None;
                }
                let members: HashSet<usize> = component.iter().map(|n| graph[*n]).collect();
                let start = members.iter().copied().min()?;
                Some(self.cycle_path(start, &members))
            })
            .collect();

        cycles.sort();
        cycles
    }

    /// Follow dependency edges inside a strongly connected component back to `start`
    fn cycle_path(&self, start: usize, members: &HashSet<usize>) -> Vec<String> {
        let mut path = vec![start];
        let mut on_path = HashSet::from([start]);
        if self.extend_cycle(start, members, &mut path, &mut on_path) {
            path.into_iter().map(|i| self.tasks[i].name.clone()).collect()
        } else {
            let mut names: Vec<String> =
                members.iter().map(|&i| self.tasks[i].name.clone()).collect();
            names.sort();
            names
        }
    }

    fn extend_cycle(
        &self,
        start: usize,
        members: &HashSet<usize>,
        path: &mut Vec<usize>,
        on_path: &mut HashSet<usize>,
    ) -> bool {
        let Some(&current) = path.last() else {
            return false;
        };
        for dep in &self.tasks[current].depends_on {
            let Some(&next) = self.index.get(dep) else {
                continue;
            };
            if next == start {
                return true;
            }
            if members.contains(&next) && on_path.insert(next) {
                path.push(next);
                if self.extend_cycle(start, members, path, on_path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Build a petgraph graph with an edge from each task to its dependencies
    fn dependency_graph_of(&self, nodes: &[usize]) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::<usize, ()>::new();
        let mut node_indices = HashMap::new();
        for &node in nodes {
            node_indices.insert(node, graph.add_node(node));
        }
        for &node in nodes {
            for dep in &self.tasks[node].depends_on {
                if let Some(&to) = self.index.get(dep).and_then(|d| node_indices.get(d)) {
                    graph.add_edge(node_indices[&node], to, ());
                }
            }
        }
        graph
    }

    /// The whole graph keyed by task name, for display
    pub fn to_petgraph(&self) -> DiGraph<String, ()> {
        let all: Vec<usize> = (0..self.tasks.len()).collect();
        self.dependency_graph_of(&all)
            .map(|_, &i| self.tasks[i].name.clone(), |_, _| ())
    }

    /// Every cycle in the graph, regardless of which targets are requested
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let all: Vec<usize> = (0..self.tasks.len()).collect();
        self.find_cycles(&all)
    }

    /// Tasks of `closure` that directly or transitively depend on `failed`,
    /// in execution order
    pub fn dependents_of(&self, failed: &str, closure: &[&Task]) -> Vec<String> {
        let mut affected: HashSet<&str> = HashSet::from([failed]);
        let mut dependents = Vec::new();
        for task in closure {
            if task.name == failed {
                continue;
            }
            if task.depends_on.iter().any(|d| affected.contains(d.as_str())) {
                affected.insert(task.name.as_str());
                dependents.push(task.name.clone());
            }
        }
        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::tasks::Action;

    fn task(name: &str, deps: &[&str]) -> Task {
        deps.iter().fold(
            Task::new(name, Action::EnsureDirectories(Vec::new())),
            |t, d| t.depends_on(*d),
        )
    }

    fn names(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.name.clone()).collect()
    }

    fn graph(tasks: Vec<Task>) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for t in tasks {
            graph.register_task(t).unwrap();
        }
        graph
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut g = TaskGraph::new();
        g.register_task(task("a", &[])).unwrap();
        let err = g.register_task(task("a", &["x"])).unwrap_err();
        assert!(matches!(err, DocbuildError::DuplicateTask(ref n) if n == "a"));
        assert_eq!(g.len(), 1);
        assert!(g.get("a").unwrap().depends_on.is_empty());
    }

    #[test]
    fn batch_with_duplicates_registers_neither() {
        let mut g = TaskGraph::new();
        let err = g
            .register_all(vec![task("a", &[]), task("b", &[]), task("a", &[])])
            .unwrap_err();
        assert!(matches!(err, DocbuildError::DuplicateTask(_)));
        assert!(g.is_empty());
    }

    #[test]
    fn conflicting_outputs_are_rejected() {
        let mut g = TaskGraph::new();
        g.register_task(task("a", &[]).output(Artifact::path("build/out.html")))
            .unwrap();
        let err = g
            .register_task(task("b", &[]).output(Artifact::path("build/out.html")))
            .unwrap_err();
        assert!(matches!(err, DocbuildError::OutputConflict { ref owner, .. } if owner == "a"));
        assert!(g.get("b").is_none());
    }

    #[test]
    fn dependencies_come_first() {
        let g = graph(vec![
            task("init", &[]),
            task("env", &["init"]),
            task("tables", &["env"]),
            task("css", &["init"]),
            task("html", &["tables", "css"]),
        ]);

        let order = g.resolve_dependency_closure(&["html"]).unwrap();
        assert_eq!(names(&order), vec!["init", "env", "tables", "css", "html"]);
    }

    #[test]
    fn shared_dependencies_appear_once() {
        let g = graph(vec![
            task("base", &[]),
            task("left", &["base"]),
            task("right", &["base"]),
            task("top", &["left", "right"]),
        ]);

        let order = g.resolve_dependency_closure(&["top", "left"]).unwrap();
        assert_eq!(names(&order), vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn order_follows_declaration_not_name() {
        let g = graph(vec![task("z", &[]), task("a", &[]), task("root", &["z", "a"])]);
        let order = g.resolve_dependency_closure(&["root"]).unwrap();
        assert_eq!(names(&order), vec!["z", "a", "root"]);
    }

    #[test]
    fn every_dependency_precedes_its_dependent() {
        let g = graph(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a", "b"]),
            task("d", &["c", "b"]),
            task("e", &["d", "a"]),
        ]);
        let order = names(&g.resolve_dependency_closure(&["e"]).unwrap());
        for t in g.tasks() {
            for dep in &t.depends_on {
                let dep_pos = order.iter().position(|n| n == dep).unwrap();
                let pos = order.iter().position(|n| n == &t.name).unwrap();
                assert!(dep_pos < pos, "{} must precede {}", dep, t.name);
            }
        }
    }

    #[test]
    fn dependencies_may_be_registered_later() {
        let g = graph(vec![task("html", &["css"]), task("css", &[])]);
        let order = g.resolve_dependency_closure(&["html"]).unwrap();
        assert_eq!(names(&order), vec!["css", "html"]);
    }

    #[test]
    fn two_task_cycle_is_named() {
        let g = graph(vec![task("a", &["b"]), task("b", &["a"])]);
        let err = g.resolve_dependency_closure(&["a"]).unwrap_err();
        match &err {
            DocbuildError::CycleDetected(cycle) => {
                assert_eq!(cycle, &vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn longer_cycle_is_reported_as_a_path() {
        let g = graph(vec![
            task("start", &["c"]),
            task("a", &["b"]),
            task("b", &["c"]),
            task("c", &["a"]),
        ]);
        let err = g.resolve_dependency_closure(&["start"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: a -> b -> c -> a"
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(vec![task("loop", &["loop"])]);
        assert!(matches!(
            g.resolve_dependency_closure(&["loop"]),
            Err(DocbuildError::CycleDetected(_))
        ));
    }

    #[test]
    fn unrelated_cycles_do_not_block_other_targets() {
        let g = graph(vec![task("a", &["b"]), task("b", &["a"]), task("ok", &[])]);
        assert_eq!(names(&g.resolve_dependency_closure(&["ok"]).unwrap()), vec!["ok"]);
        assert_eq!(g.cycles().len(), 1);
    }

    #[test]
    fn unknown_root_or_dependency_fails() {
        let g = graph(vec![task("a", &["missing"])]);
        assert!(matches!(
            g.resolve_dependency_closure(&["nope"]),
            Err(DocbuildError::UnknownTask(ref n)) if n == "nope"
        ));
        assert!(matches!(
            g.resolve_dependency_closure(&["a"]),
            Err(DocbuildError::UnknownTask(ref n)) if n == "missing"
        ));
    }

    #[test]
    fn dependents_cover_transitive_chain() {
        let g = graph(vec![
            task("init", &[]),
            task("env", &["init"]),
            task("tables", &["env"]),
            task("css", &["init"]),
            task("html", &["tables", "css"]),
        ]);
        let order = g.resolve_dependency_closure(&["html"]).unwrap();
        assert_eq!(g.dependents_of("tables", &order), vec!["html"]);
        assert_eq!(
            g.dependents_of("init", &order),
            vec!["env", "tables", "css", "html"]
        );
    }

    #[test]
    fn petgraph_view_has_dependency_edges() {
        let g = graph(vec![task("a", &[]), task("b", &["a"])]);
        let pg = g.to_petgraph();
        assert_eq!(pg.node_count(), 2);
        assert_eq!(pg.edge_count(), 1);
    }
}
