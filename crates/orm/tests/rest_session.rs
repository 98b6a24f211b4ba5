mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{bar, context, foo, Bar, Foo};
use serde_json::{Map, Value as JsonValue};
use tessera_orm::criteria::eq;
use tessera_orm::rest::{RestMethod, RestRequest, RestResponse, RestSession, RestTransport};
use tessera_orm::{CriteriaSpec, MessageType, OrmConfig, OrmError, OrmResult, SaveOutcome, Session};
use tessera_core::RestConfig;
use url::form_urlencoded;

const FORM: &str = "application/x-www-form-urlencoded";

/// In-memory resource store keyed by URL path
#[derive(Default)]
struct MockTransport {
    resources: Mutex<HashMap<String, Map<String, JsonValue>>>,
    requests: Mutex<Vec<RestRequest>>,
    next_id: Mutex<i64>,
    fail_with: Mutex<Option<u16>>,
}

impl MockTransport {
    fn decode(content_type: &str, body: &str) -> Map<String, JsonValue> {
        if content_type == FORM {
            form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), JsonValue::String(v.into_owned())))
                .collect()
        } else {
            match serde_json::from_str(body).unwrap() {
                JsonValue::Object(map) => map,
                other => panic!("unexpected payload {other}"),
            }
        }
    }

    fn encode(content_type: &str, map: &Map<String, JsonValue>) -> String {
        if content_type == FORM {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (k, v) in map {
                match v {
                    JsonValue::String(s) => serializer.append_pair(k, s),
                    other => serializer.append_pair(k, &other.to_string()),
                };
            }
            serializer.finish()
        } else {
            JsonValue::Object(map.clone()).to_string()
        }
    }

    fn methods(&self) -> Vec<(RestMethod, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.method, r.url.path().to_string()))
            .collect()
    }
}

impl RestTransport for MockTransport {
    fn send(&self, request: RestRequest) -> OrmResult<RestResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Ok(RestResponse::new(status, ""));
        }

        let content_type = request.content_type;
        let path = request.url.path().trim_end_matches('/').to_string();
        let mut resources = self.resources.lock().unwrap();
        let response = match request.method {
            RestMethod::Post => {
                let mut body = Self::decode(content_type, request.body.as_deref().unwrap_or(""));
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                body.insert("id".into(), JsonValue::from(*next));
                resources.insert(format!("{}/{}", path, next), body.clone());
                RestResponse::new(201, Self::encode(content_type, &body))
            }
            RestMethod::Put => match resources.get_mut(&path) {
                Some(existing) => {
                    *existing = Self::decode(content_type, request.body.as_deref().unwrap_or(""));
                    RestResponse::new(204, "")
                }
                None => RestResponse::new(404, ""),
            },
            RestMethod::Get => match resources.get(&path) {
                Some(body) => RestResponse::new(200, Self::encode(content_type, body)),
                None => RestResponse::new(404, ""),
            },
            RestMethod::Delete => match resources.remove(&path) {
                Some(_) => RestResponse::new(204, ""),
                None => RestResponse::new(404, ""),
            },
        };
        Ok(response)
    }
}

fn rest_config(message_type: MessageType) -> OrmConfig {
    let mut rest = RestConfig::new("http://api.example.test/v1/");
    rest.connection_timeout = Duration::from_secs(3);
    rest.response_timeout = Duration::from_secs(7);
    rest.message_type = message_type;
    OrmConfig {
        rest: Some(rest),
        ..OrmConfig::default()
    }
}

fn session_with(message_type: MessageType) -> (RestSession, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::default());
    let mut session = context(rest_config(message_type))
        .rest_session(transport.clone())
        .unwrap();
    session.open().unwrap();
    (session, transport)
}

#[test]
fn test_save_posts_and_absorbs_the_generated_key() {
    let (mut session, transport) = session_with(MessageType::Json);
    let mut model = foo("remote", 1.5);
    assert_eq!(session.save(&mut model).unwrap(), 1);
    assert_eq!(model.id, 1);

    let requests = transport.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.method, RestMethod::Post);
    assert_eq!(request.url.as_str(), "http://api.example.test/v1/foo");
    assert_eq!(request.content_type, "application/json");
    assert_eq!(request.connection_timeout, Duration::from_secs(3));
    assert_eq!(request.response_timeout, Duration::from_secs(7));
    let sent: JsonValue = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(sent["name"], "remote");
    assert_eq!(sent["score"], 1.5);
    assert!(sent.get("bars").is_none());
}

#[test]
fn test_load_reads_through_the_cache() {
    let (mut session, transport) = session_with(MessageType::Json);
    let mut model = foo("remote", 0.0);
    session.save(&mut model).unwrap();

    let loaded: Foo = session.load(model.id).unwrap().unwrap();
    assert_eq!(loaded.name, "remote");
    assert_eq!(transport.requests.lock().unwrap().len(), 1);

    session.recycle_cache();
    let loaded: Foo = session.load(model.id).unwrap().unwrap();
    assert_eq!(loaded.name, "remote");
    assert_eq!(
        transport.methods().last(),
        Some(&(RestMethod::Get, "/v1/foo/1".to_string()))
    );
    assert_eq!(session.cache_len(), 1);

    assert!(session.load::<Foo, _>(9i32).unwrap().is_none());
}

#[test]
fn test_update_delete_and_missing_resources() {
    let (mut session, transport) = session_with(MessageType::Json);
    let mut model = bar("b-1");
    session.save(&mut model).unwrap();

    model.code = "b-2".into();
    assert!(session.update(&mut model).unwrap());
    session.recycle_cache();
    let loaded: Bar = session.load(model.id).unwrap().unwrap();
    assert_eq!(loaded.code, "b-2");

    assert!(session.delete(&model).unwrap());
    assert!(!session.check_cache::<Bar, _>(model.id).unwrap());
    assert!(!session.delete(&model).unwrap());
    assert!(!session.update(&mut model).unwrap());

    let methods: Vec<_> = transport.methods().into_iter().map(|(m, _)| m).collect();
    assert_eq!(
        methods,
        [
            RestMethod::Post,
            RestMethod::Put,
            RestMethod::Get,
            RestMethod::Delete,
            RestMethod::Delete,
            RestMethod::Put,
        ]
    );
}

#[test]
fn test_save_or_update_falls_back_to_post() {
    let (mut session, _transport) = session_with(MessageType::Json);
    let mut model = foo("first", 0.0);
    assert_eq!(
        session.save_or_update(&mut model).unwrap(),
        SaveOutcome::Inserted(1)
    );
    assert_eq!(session.save_or_update(&mut model).unwrap(), SaveOutcome::Updated);

    let mut stale = foo("stale", 0.0);
    stale.id = 40;
    assert_eq!(
        session.save_or_update(&mut stale).unwrap(),
        SaveOutcome::Inserted(2)
    );
}

#[test]
fn test_server_errors_surface() {
    let (mut session, transport) = session_with(MessageType::Json);
    *transport.fail_with.lock().unwrap() = Some(500);
    let err = session.save(&mut foo("x", 0.0)).unwrap_err();
    assert!(matches!(err, OrmError::Rest(_)), "{err:?}");
    assert!(matches!(session.load::<Foo, _>(1i32), Err(OrmError::Rest(_))));

    *transport.fail_with.lock().unwrap() = Some(404);
    assert!(matches!(
        session.save(&mut foo("x", 0.0)),
        Err(OrmError::Rest(_))
    ));
}

#[test]
fn test_name_value_payloads() {
    let (mut session, transport) = session_with(MessageType::NameValue);
    let mut model = foo("a b", 2.0);
    session.save(&mut model).unwrap();
    assert_eq!(model.id, 1);

    {
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].content_type, FORM);
        assert_eq!(requests[0].body.as_deref(), Some("id=0&name=a+b&score=2.0"));
    }

    session.recycle_cache();
    let loaded: Foo = session.load(1i32).unwrap().unwrap();
    assert_eq!(loaded.name, "a b");
    assert_eq!(loaded.score, 2.0);
}

#[test]
fn test_unsupported_operations() {
    let (mut session, _transport) = session_with(MessageType::Json);
    assert!(matches!(session.begin_transaction(), Err(OrmError::Unsupported(_))));
    assert!(matches!(session.commit(), Err(OrmError::Unsupported(_))));
    assert!(matches!(session.rollback(), Err(OrmError::Unsupported(_))));
    assert!(matches!(
        session.execute("DELETE FROM foo"),
        Err(OrmError::Unsupported(_))
    ));
    let spec = CriteriaSpec::of::<Foo>().add(eq("name", "x"));
    assert!(matches!(
        session.list::<Foo>(&spec),
        Err(OrmError::Unsupported(_))
    ));
}

#[test]
fn test_requires_open_session_and_rest_config() {
    let transport = Arc::new(MockTransport::default());
    let mut session = context(rest_config(MessageType::Json))
        .rest_session(transport.clone())
        .unwrap();
    assert!(matches!(
        session.save(&mut foo("x", 0.0)),
        Err(OrmError::SessionNotOpen)
    ));
    assert!(transport.requests.lock().unwrap().is_empty());

    let err = context(OrmConfig::in_memory())
        .rest_session(transport)
        .unwrap_err();
    assert!(matches!(err, OrmError::Config(_)), "{err:?}");
}
