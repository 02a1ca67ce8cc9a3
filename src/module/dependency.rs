//! 模块依赖管理
//!
//! 本模块提供模块依赖关系的图结构以及在其上的规划查询。
//!
//! # 主要组件
//!
//! - [`DependencyGraph`] - 依赖关系图，从一组模块清单构建，构建后不再修改
//! - [`ImpactReport`] - 影响分析结果
//! - [`HubModule`] / [`Cluster`] - 枢纽模块与连通分量
//!
//! 边 `A -> B` 表示 "A 必需依赖 B"。只有必需依赖参与安装顺序计算；
//! 可选依赖是建议性的边，仅用于影响分析和聚类。
//!
//! # 示例
//!
//! ```rust
//! use chips_modules::module::dependency::DependencyGraph;
//! use chips_modules::module::manifest::ModuleManifest;
//!
//! let graph = DependencyGraph::build(vec![
//!     ModuleManifest::new("app", "1.0").requires(["service"]),
//!     ModuleManifest::new("service", "1.0").requires(["database"]),
//!     ModuleManifest::new("database", "1.0"),
//! ]).unwrap();
//!
//! assert_eq!(graph.topological_order().unwrap(), vec!["database", "service", "app"]);
//! assert!(graph.find_cycles().is_empty());
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::module::manifest::ModuleManifest;
use crate::module::state::ModuleState;
use crate::utils::{CoreError, Result};

/// 依赖类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// 必需依赖
    Required,
    /// 可选依赖
    Optional,
}

/// 无法解析的依赖边（目标不在清单集合中）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedEdge {
    /// 声明依赖的模块
    pub module: String,
    /// 缺失的依赖目标
    pub dependency: String,
}

/// 关键度评分权重
///
/// `score = direct_dependent_weight × 直接依赖方数量 + impact_radius_weight × 影响半径`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalityWeights {
    /// 直接依赖方数量的权重
    pub direct_dependent_weight: f64,
    /// 影响半径的权重
    pub impact_radius_weight: f64,
}

impl Default for CriticalityWeights {
    fn default() -> Self {
        Self {
            direct_dependent_weight: 1.0,
            impact_radius_weight: 0.5,
        }
    }
}

impl CriticalityWeights {
    /// 计算关键度评分
    pub fn score(&self, direct_dependents: usize, impact_radius: usize) -> f64 {
        self.direct_dependent_weight * direct_dependents as f64
            + self.impact_radius_weight * impact_radius as f64
    }
}

/// 直接依赖条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDependency {
    pub name: String,
    pub kind: DependencyKind,
    /// 目标存在且处于启用状态
    pub satisfied: bool,
}

/// 传递依赖条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitiveDependency {
    pub name: String,
    /// 最短跳数（≥ 1）
    pub depth: usize,
}

/// 依赖方条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub name: String,
    pub kind: DependencyKind,
}

/// 影响分析报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// 被分析的模块
    pub module: String,
    /// 直接依赖（必需在前，可选在后，保持声明顺序）
    pub direct_dependencies: Vec<DirectDependency>,
    /// 沿必需边的传递依赖（按深度、名称排序）
    pub transitive_dependencies: Vec<TransitiveDependency>,
    /// 依赖该模块的模块（按名称排序）
    pub dependents: Vec<Dependent>,
    /// 移除该模块会直接或间接破坏的模块数量
    pub impact_radius: usize,
    /// 关键度评分，越高越危险
    pub criticality_score: f64,
}

/// 枢纽模块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubModule {
    pub name: String,
    pub direct_dependents: usize,
    pub impact_radius: usize,
    pub criticality_score: f64,
}

/// 弱连通分量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// 成员（按名称排序）
    pub members: Vec<String>,
    pub size: usize,
    /// 分量内部的无向边数
    pub edge_count: usize,
    /// 互联密度：`edge_count / (size × (size − 1) / 2)`，单成员时为 0
    pub density: f64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// 模块依赖关系图
///
/// 从模块清单的不可变快照构建，每次规划调用重新构建，不做原地修改。
/// 节点以模块名作为稳定键，便于快照复制。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 节点：模块名 -> 清单
    manifests: BTreeMap<String, ModuleManifest>,
    /// 正向必需边：模块 -> 该模块依赖的模块
    edges: BTreeMap<String, Vec<String>>,
    /// 反向必需边：模块 -> 依赖该模块的模块
    reverse_edges: BTreeMap<String, Vec<String>>,
    /// 正向可选边（仅包含图中存在的目标）
    optional_edges: BTreeMap<String, Vec<String>>,
    /// 反向可选边
    reverse_optional_edges: BTreeMap<String, Vec<String>>,
    /// 模块状态快照，用于判断依赖是否已满足
    states: HashMap<String, ModuleState>,
    /// 关键度权重
    weights: CriticalityWeights,
}

impl DependencyGraph {
    /// 从模块清单构建依赖图
    ///
    /// # 错误
    ///
    /// 如果某个必需依赖不在清单集合中，返回 `CoreError::UnknownDependency`。
    /// 可选依赖缺失不视为错误。
    pub fn build<I>(manifests: I) -> Result<Self>
    where
        I: IntoIterator<Item = ModuleManifest>,
    {
        let (graph, unresolved) = Self::build_lenient(manifests);
        if let Some(edge) = unresolved.into_iter().next() {
            return Err(CoreError::UnknownDependency {
                module: edge.module,
                dependency: edge.dependency,
            });
        }
        Ok(graph)
    }

    /// 宽松构建：丢弃无法解析的必需边并返回它们
    ///
    /// 调用方自行决定把缺失的依赖视为致命错误还是"尚未安装"。
    /// 返回的缺失边按模块名、声明顺序排列。
    pub fn build_lenient<I>(manifests: I) -> (Self, Vec<UnresolvedEdge>)
    where
        I: IntoIterator<Item = ModuleManifest>,
    {
        let mut graph = Self::new();
        for manifest in manifests {
            graph.manifests.insert(manifest.name.clone(), manifest);
        }

        let mut unresolved = Vec::new();
        let names: Vec<String> = graph.manifests.keys().cloned().collect();
        for name in &names {
            let (required, optional) = match graph.manifests.get(name) {
                Some(m) => (
                    m.required_dependencies.clone(),
                    m.optional_dependencies.clone(),
                ),
                None => continue,
            };

            for dep in required {
                if graph.manifests.contains_key(&dep) {
                    Self::add_edge(&mut graph.edges, &mut graph.reverse_edges, name, &dep);
                } else {
                    unresolved.push(UnresolvedEdge {
                        module: name.clone(),
                        dependency: dep,
                    });
                }
            }
            for dep in optional {
                if graph.manifests.contains_key(&dep) {
                    Self::add_edge(
                        &mut graph.optional_edges,
                        &mut graph.reverse_optional_edges,
                        name,
                        &dep,
                    );
                }
            }
        }

        (graph, unresolved)
    }

    fn new() -> Self {
        Self::default()
    }

    /// 附加模块状态快照
    pub fn with_states(mut self, states: HashMap<String, ModuleState>) -> Self {
        self.states = states;
        self
    }

    /// 设置关键度权重
    pub fn with_weights(mut self, weights: CriticalityWeights) -> Self {
        self.weights = weights;
        self
    }

    fn add_edge(
        forward: &mut BTreeMap<String, Vec<String>>,
        reverse: &mut BTreeMap<String, Vec<String>>,
        from: &str,
        to: &str,
    ) {
        let deps = forward.entry(from.to_string()).or_default();
        if !deps.iter().any(|d| d == to) {
            deps.push(to.to_string());
        }
        let rev = reverse.entry(to.to_string()).or_default();
        if !rev.iter().any(|d| d == from) {
            rev.push(from.to_string());
        }
    }

    // ==================== 基础查询 ====================

    /// 检查是否包含指定模块
    pub fn contains_module(&self, name: &str) -> bool {
        self.manifests.contains_key(name)
    }

    /// 获取图中模块数量
    pub fn module_count(&self) -> usize {
        self.manifests.len()
    }

    /// 检查图是否为空
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// 获取所有模块名（升序）
    pub fn get_all_modules(&self) -> Vec<String> {
        self.manifests.keys().cloned().collect()
    }

    /// 获取模块清单
    pub fn manifest(&self, name: &str) -> Option<&ModuleManifest> {
        self.manifests.get(name)
    }

    /// 获取快照中的模块状态，未记录的视为未安装
    pub fn state_of(&self, name: &str) -> ModuleState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// 获取模块的直接必需依赖（已解析的）
    pub fn get_dependencies(&self, name: &str) -> Vec<String> {
        self.edges.get(name).cloned().unwrap_or_default()
    }

    /// 获取必需依赖该模块的模块
    pub fn get_dependents(&self, name: &str) -> Vec<String> {
        self.reverse_edges.get(name).cloned().unwrap_or_default()
    }

    /// 获取可选依赖该模块的模块
    pub fn get_optional_dependents(&self, name: &str) -> Vec<String> {
        self.reverse_optional_edges
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// 获取模块的所有传递必需依赖（不含自身，升序）
    pub fn get_all_dependencies(&self, name: &str) -> Vec<String> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![name];
        while let Some(current) = stack.pop() {
            for dep in self.edges.get(current).into_iter().flatten() {
                if visited.insert(dep.clone()) {
                    stack.push(dep);
                }
            }
        }
        visited.remove(name);
        visited.into_iter().collect()
    }

    fn sorted_neighbors<'a>(map: &'a BTreeMap<String, Vec<String>>, name: &str) -> Vec<&'a str> {
        let mut neighbors: Vec<&str> = map
            .get(name)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default();
        neighbors.sort_unstable();
        neighbors
    }

    // ==================== 环检测 ====================

    /// 查找所有循环依赖
    ///
    /// 使用三色标记的深度优先搜索，节点和邻居都按名称升序访问，结果可复现。
    /// 每条回边产生一个环：从环的入口模块开始，沿依赖方向到达闭合回边的模块，
    /// 入口模块不重复出现（展示时由调用方追加）。
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut colors: HashMap<&str, Color> = self
            .manifests
            .keys()
            .map(|name| (name.as_str(), Color::White))
            .collect();
        let mut path: Vec<&str> = Vec::new();
        let mut cycles = Vec::new();

        for name in self.manifests.keys() {
            if colors.get(name.as_str()) == Some(&Color::White) {
                self.visit_for_cycles(name, &mut colors, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn visit_for_cycles<'a>(
        &'a self,
        node: &'a str,
        colors: &mut HashMap<&'a str, Color>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        colors.insert(node, Color::Gray);
        path.push(node);

        for next in Self::sorted_neighbors(&self.edges, node) {
            match colors.get(next).copied().unwrap_or(Color::Black) {
                Color::White => self.visit_for_cycles(next, colors, path, cycles),
                Color::Gray => {
                    if let Some(start) = path.iter().position(|n| *n == next) {
                        cycles.push(path[start..].iter().map(|n| n.to_string()).collect());
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
    }

    /// 检测是否存在循环依赖
    pub fn has_cycle(&self) -> bool {
        !self.find_cycles().is_empty()
    }

    /// 模块是否处于某个必需依赖环上
    pub fn is_in_cycle(&self, name: &str) -> bool {
        self.reaches(name, name)
    }

    /// 经过指定模块的一个最短必需依赖环
    ///
    /// 环从该模块开始，沿依赖方向排列，不重复起点。模块不在任何环上时返回 `None`。
    pub fn cycle_through(&self, name: &str) -> Option<Vec<String>> {
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for dep in Self::sorted_neighbors(&self.edges, name) {
            if dep == name {
                return Some(vec![name.to_string()]);
            }
            if !parents.contains_key(dep) {
                parents.insert(dep, name);
                queue.push_back(dep);
            }
        }

        while let Some(current) = queue.pop_front() {
            for next in Self::sorted_neighbors(&self.edges, current) {
                if next == name {
                    let mut path = vec![current.to_string()];
                    let mut node = current;
                    while let Some(&parent) = parents.get(node) {
                        if parent == name {
                            break;
                        }
                        path.push(parent.to_string());
                        node = parent;
                    }
                    path.push(name.to_string());
                    path.reverse();
                    return Some(path);
                }
                if !parents.contains_key(next) {
                    parents.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// 从 `from` 的依赖出发能否沿必需边到达 `target`
    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self
            .edges
            .get(from)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if visited.insert(current) {
                if let Some(deps) = self.edges.get(current) {
                    stack.extend(deps.iter().map(String::as_str));
                }
            }
        }
        false
    }

    // ==================== 拓扑排序 ====================

    /// 拓扑排序（Kahn 算法）
    ///
    /// 返回安装顺序，保证依赖在依赖方之前。同一步有多个入度为零的模块时按名称升序选取，
    /// 相同输入总是得到相同输出。
    ///
    /// # 错误
    ///
    /// 如果存在循环依赖，返回包装了 [`find_cycles`](Self::find_cycles) 结果的
    /// `CoreError::CircularDependency`。
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let all: BTreeSet<&str> = self.manifests.keys().map(String::as_str).collect();
        self.order_subset(&all)
    }

    /// 获取卸载顺序（安装顺序的反序）
    pub fn removal_order(&self) -> Result<Vec<String>> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    /// 安装计划：模块的必需依赖闭包按安装顺序排列，模块自身在最后
    ///
    /// # 错误
    ///
    /// - `CoreError::ModuleNotFound` - 模块不在图中
    /// - `CoreError::CircularDependency` - 依赖闭包中存在环
    pub fn install_plan(&self, name: &str) -> Result<Vec<String>> {
        if !self.contains_module(name) {
            return Err(CoreError::ModuleNotFound(name.to_string()));
        }
        let closure = self.get_all_dependencies(name);
        let mut subset: BTreeSet<&str> = closure.iter().map(String::as_str).collect();
        subset.insert(name);
        self.order_subset(&subset)
    }

    /// 在节点子集上执行 Kahn 算法，子集必须对必需依赖封闭
    fn order_subset(&self, subset: &BTreeSet<&str>) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = subset
            .iter()
            .map(|name| {
                let degree = self
                    .edges
                    .get(*name)
                    .map(|deps| deps.iter().filter(|d| subset.contains(d.as_str())).count())
                    .unwrap_or(0);
                (*name, degree)
            })
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());

            for dependent in self.reverse_edges.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if order.len() != subset.len() {
            let scheduled: HashSet<&str> = order.iter().map(String::as_str).collect();
            let cycles: Vec<Vec<String>> = self
                .find_cycles()
                .into_iter()
                .filter(|cycle| {
                    cycle
                        .iter()
                        .any(|n| subset.contains(n.as_str()) && !scheduled.contains(n.as_str()))
                })
                .collect();
            tracing::debug!(cycles = cycles.len(), "拓扑排序失败，存在循环依赖");
            return Err(CoreError::CircularDependency { cycles });
        }

        Ok(order)
    }

    // ==================== 影响分析 ====================

    /// 分析模块的影响
    ///
    /// # 错误
    ///
    /// 如果模块不在图中，返回 `CoreError::ModuleNotFound`。
    pub fn analyze_impact(&self, name: &str) -> Result<ImpactReport> {
        let manifest = self
            .manifests
            .get(name)
            .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))?;

        let direct_dependencies = manifest
            .required_dependencies
            .iter()
            .map(|d| (d, DependencyKind::Required))
            .chain(
                manifest
                    .optional_dependencies
                    .iter()
                    .map(|d| (d, DependencyKind::Optional)),
            )
            .map(|(dep, kind)| DirectDependency {
                name: dep.clone(),
                kind,
                satisfied: self.contains_module(dep)
                    && self.state_of(dep) == ModuleState::Enabled,
            })
            .collect();

        let dependents = self.collect_dependents(name);
        let impact_radius = self.impact_radius(name);

        Ok(ImpactReport {
            module: name.to_string(),
            direct_dependencies,
            transitive_dependencies: self.transitive_with_depth(name),
            criticality_score: self.weights.score(dependents.len(), impact_radius),
            dependents,
            impact_radius,
        })
    }

    /// 广度优先遍历必需边，记录最短深度
    fn transitive_with_depth(&self, name: &str) -> Vec<TransitiveDependency> {
        let mut depths: HashMap<&str, usize> = HashMap::new();
        depths.insert(name, 0);
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            let depth = depths.get(current).copied().unwrap_or(0);
            for dep in Self::sorted_neighbors(&self.edges, current) {
                if depths.contains_key(dep) {
                    continue;
                }
                depths.insert(dep, depth + 1);
                result.push(TransitiveDependency {
                    name: dep.to_string(),
                    depth: depth + 1,
                });
                queue.push_back(dep);
            }
        }

        result.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));
        result
    }

    /// 直接依赖方（必需优先于可选），按名称排序
    fn collect_dependents(&self, name: &str) -> Vec<Dependent> {
        let mut dependents: BTreeMap<String, DependencyKind> = BTreeMap::new();
        for optional in self.get_optional_dependents(name) {
            dependents.insert(optional, DependencyKind::Optional);
        }
        for required in self.get_dependents(name) {
            dependents.insert(required, DependencyKind::Required);
        }
        dependents
            .into_iter()
            .map(|(name, kind)| Dependent { name, kind })
            .collect()
    }

    /// 沿反向必需边可达的不同模块数量（不含自身）
    fn impact_radius(&self, name: &str) -> usize {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.reverse_edges.get(current).into_iter().flatten() {
                if dependent != name && visited.insert(dependent.as_str()) {
                    queue.push_back(dependent);
                }
            }
        }
        visited.len()
    }

    /// 识别枢纽模块
    ///
    /// 返回直接依赖方数量 ≥ `threshold` 的模块，按关键度降序、名称升序排列。
    pub fn identify_hubs(&self, threshold: usize) -> Vec<HubModule> {
        let mut hubs: Vec<HubModule> = self
            .manifests
            .keys()
            .filter_map(|name| {
                let direct = self.collect_dependents(name).len();
                if direct < threshold {
                    return None;
                }
                let radius = self.impact_radius(name);
                Some(HubModule {
                    name: name.clone(),
                    direct_dependents: direct,
                    impact_radius: radius,
                    criticality_score: self.weights.score(direct, radius),
                })
            })
            .collect();

        hubs.sort_by(|a, b| {
            b.criticality_score
                .partial_cmp(&a.criticality_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        hubs
    }

    // ==================== 聚类 ====================

    /// 将无向化的依赖图（必需 + 可选边）划分为弱连通分量
    ///
    /// 分量按大小降序、首个成员名称升序排列。
    pub fn cluster(&self) -> Vec<Cluster> {
        let names: Vec<&str> = self.manifests.keys().map(String::as_str).collect();
        let index: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut sets = DisjointSet::new(names.len());

        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (from, targets) in self.edges.iter().chain(self.optional_edges.iter()) {
            let Some(&a) = index.get(from.as_str()) else {
                continue;
            };
            for to in targets {
                let Some(&b) = index.get(to.as_str()) else {
                    continue;
                };
                if a == b {
                    continue;
                }
                sets.union(a, b);
                pairs.insert((a.min(b), a.max(b)));
            }
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..names.len() {
            groups.entry(sets.find(i)).or_default().push(i);
        }

        let mut edge_counts: HashMap<usize, usize> = HashMap::new();
        for (a, _) in &pairs {
            *edge_counts.entry(sets.find(*a)).or_insert(0) += 1;
        }

        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .map(|(root, members)| {
                let size = members.len();
                let edge_count = edge_counts.get(&root).copied().unwrap_or(0);
                let density = if size > 1 {
                    edge_count as f64 / (size * (size - 1) / 2) as f64
                } else {
                    0.0
                };
                Cluster {
                    members: members.into_iter().map(|i| names[i].to_string()).collect(),
                    size,
                    edge_count,
                    density,
                }
            })
            .collect();

        clusters.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.members.cmp(&b.members)));
        clusters
    }
}

/// 并查集（路径压缩 + 按秩合并）
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}
