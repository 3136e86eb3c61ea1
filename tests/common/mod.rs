#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cyphervector::{
    CypherExecutor, GraphService, GraphSession, HyperVectorType, MapperConfig, Node, NodeConfig,
    Relation, RelationshipConfig, Root, Row, SessionError, Statement, TypeRegistry, UnitOfWork,
    VectorType,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

type Handler = dyn Fn(&Statement) -> Result<Vec<Row>, SessionError> + Send + Sync;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub statement: Statement,
    pub in_tx: bool,
}

impl Recorded {
    pub fn text(&self) -> &str {
        &self.statement.text
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.statement.param(name)
    }
}

struct Shared {
    handler: Box<Handler>,
    log: Mutex<Vec<Recorded>>,
    begun: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Shared {
    fn execute(&self, statement: &Statement, in_tx: bool) -> Result<Vec<Row>, SessionError> {
        self.log.lock().push(Recorded {
            statement: statement.clone(),
            in_tx,
        });
        (self.handler)(statement)
    }
}

/// Scripted session: every statement is recorded and answered by the handler.
pub struct MockSession {
    shared: Arc<Shared>,
}

impl MockSession {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&Statement) -> Result<Vec<Row>, SessionError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            shared: Arc::new(Shared {
                handler: Box::new(handler),
                log: Mutex::new(Vec::new()),
                begun: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            }),
        })
    }

    /// Answers every statement with no rows.
    pub fn empty() -> Arc<Self> {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.shared.log.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .map(|r| r.statement.text)
            .collect()
    }

    pub fn begun(&self) -> usize {
        self.shared.begun.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CypherExecutor for MockSession {
    async fn run(&self, statement: &Statement) -> Result<(), SessionError> {
        self.shared.execute(statement, false).map(|_| ())
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, SessionError> {
        self.shared.execute(statement, false)
    }
}

#[async_trait]
impl GraphSession for MockSession {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, SessionError> {
        self.shared.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockUnitOfWork {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockUnitOfWork {
    shared: Arc<Shared>,
}

#[async_trait]
impl CypherExecutor for MockUnitOfWork {
    async fn run(&self, statement: &Statement) -> Result<(), SessionError> {
        self.shared.execute(statement, true).map(|_| ())
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, SessionError> {
        self.shared.execute(statement, true)
    }
}

#[async_trait]
impl UnitOfWork for MockUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), SessionError> {
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), SessionError> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds a row from a JSON object literal.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub root: Root,
    #[serde(default)]
    pub email: Option<String>,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            root: Root {
                name: Some(name.to_string()),
                ..Root::default()
            },
            email: None,
        }
    }

    pub fn stored(id: Uuid, name: &str) -> Self {
        let mut person = Self::named(name);
        person.root.id = Some(id);
        person
    }
}

impl Node for Person {
    fn declaration() -> NodeConfig {
        NodeConfig::new("Person")
    }

    fn root(&self) -> &Root {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    #[serde(flatten)]
    pub root: Root,
    #[serde(default)]
    pub sector: Option<String>,
}

impl Organisation {
    pub fn stored(id: Uuid, name: &str) -> Self {
        Self {
            root: Root {
                id: Some(id),
                name: Some(name.to_string()),
                ..Root::default()
            },
            sector: None,
        }
    }
}

impl Node for Organisation {
    fn declaration() -> NodeConfig {
        NodeConfig::new("Organisation").key("org")
    }

    fn root(&self) -> &Root {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    pub root: Root,
}

impl Node for City {
    fn declaration() -> NodeConfig {
        NodeConfig::new("City")
    }

    fn root(&self) -> &Root {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }
}

/// A node whose declared key is not a valid variable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Broken {
    #[serde(flatten)]
    pub root: Root,
}

impl Node for Broken {
    fn declaration() -> NodeConfig {
        NodeConfig::new("Broken").key("1st")
    }

    fn root(&self) -> &Root {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Root {
        &mut self.root
    }
}

macro_rules! relation {
    ($name:ident, $decl:expr) => {
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub id: Option<Uuid>,
            #[serde(default)]
            pub role: Option<String>,
        }

        impl Relation for $name {
            fn declaration() -> RelationshipConfig {
                $decl
            }

            fn id(&self) -> Option<Uuid> {
                self.id
            }

            fn set_id(&mut self, id: Uuid) {
                self.id = Some(id);
            }
        }
    };
}

relation!(MemberOf, RelationshipConfig::new("MEMBER_OF"));
relation!(
    Knows,
    RelationshipConfig::new("KNOWS").same_node_multiple_allowed(true)
);
relation!(
    HeadOf,
    RelationshipConfig::new("HEAD_OF").multiple_allowed(false)
);
relation!(Hosts, RelationshipConfig::new("HOSTS").incoming());

pub struct PersonMemberOf;

impl VectorType for PersonMemberOf {
    type Relation = MemberOf;
    type Source = Person;
    type Target = Organisation;
}

pub struct PersonKnows;

impl VectorType for PersonKnows {
    type Relation = Knows;
    type Source = Person;
    type Target = Person;
}

pub struct PersonHeadOf;

impl VectorType for PersonHeadOf {
    type Relation = HeadOf;
    type Source = Person;
    type Target = Organisation;
}

/// `(org:Organisation)<-[h:HOSTS]-(c:City)`
pub struct OrganisationHostedBy;

impl VectorType for OrganisationHostedBy {
    type Relation = Hosts;
    type Source = Organisation;
    type Target = City;
}

pub struct MemberCity;

impl HyperVectorType for MemberCity {
    type Left = PersonMemberOf;
    type Right = OrganisationHostedBy;
}

/// Never registered.
pub struct Unregistered;

impl VectorType for Unregistered {
    type Relation = MemberOf;
    type Source = Organisation;
    type Target = Person;
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_vector::<PersonKnows>()
        .expect("knows")
        .register_vector::<PersonHeadOf>()
        .expect("head of")
        .register_hyper_vector::<MemberCity>()
        .expect("member city");
    registry
}

pub fn service(session: Arc<MockSession>) -> GraphService<MockSession> {
    GraphService::new(session, registry(), MapperConfig::default())
}

pub fn service_with(session: Arc<MockSession>, config: MapperConfig) -> GraphService<MockSession> {
    GraphService::new(session, registry(), config)
}
