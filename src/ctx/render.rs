// src/ctx/render.rs

//! Template rendering with a restricted evaluation context.
//!
//! Templates see exactly three names: `input`, `env` and `xcom`. There is
//! no arbitrary code execution and rendering is side-effect free; the only
//! live state a template can observe is `xcom`, exposed as an object whose
//! entries answer `peek()` (empty string when the channel is empty).
//!
//! Results are cached per shared context, but only for templates that
//! reference neither `xcom` (live state) nor `env` (differs per task);
//! inputs are fixed once a session starts, so those renders are pure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use minijinja::value::{Object, Value as TemplateValue};
use minijinja::{Environment, ErrorKind, State, context};
use serde_json::Value;

use super::xcom::XcomMap;

#[derive(Debug)]
pub struct Renderer {
    env: Environment<'static>,
    xcom: Arc<XcomMap>,
    cache: Mutex<HashMap<String, String>>,
}

impl Renderer {
    pub fn new(xcom: Arc<XcomMap>) -> Self {
        Self {
            env: Environment::new(),
            xcom,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Render `template` against the given inputs and effective env.
    pub fn render(
        &self,
        template: &str,
        input: &HashMap<String, Value>,
        env: &HashMap<String, String>,
    ) -> Result<String, minijinja::Error> {
        // Fast path: not a template at all.
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }

        let cacheable = !template.contains("xcom") && !template.contains("env");
        if cacheable {
            if let Some(hit) = self.cache.lock().unwrap().get(template) {
                return Ok(hit.clone());
            }
        }

        let ctx = context! {
            input => TemplateValue::from_serialize(input),
            env => TemplateValue::from_serialize(env),
            xcom => TemplateValue::from_object(XcomProxy {
                xcom: self.xcom.clone(),
            }),
        };

        let rendered = self.env.render_str(template, ctx)?;

        if cacheable {
            self.cache
                .lock()
                .unwrap()
                .insert(template.to_string(), rendered.clone());
        }

        Ok(rendered)
    }
}

/// `xcom` as seen by templates: subscripting yields a channel view.
#[derive(Debug)]
struct XcomProxy {
    xcom: Arc<XcomMap>,
}

impl Object for XcomProxy {
    fn get_value(self: &Arc<Self>, key: &TemplateValue) -> Option<TemplateValue> {
        let task = key.as_str()?;
        Some(TemplateValue::from_object(XcomEntry {
            xcom: self.xcom.clone(),
            task: task.to_string(),
        }))
    }
}

/// One task's channel as seen by templates.
#[derive(Debug)]
struct XcomEntry {
    xcom: Arc<XcomMap>,
    task: String,
}

impl Object for XcomEntry {
    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        _args: &[TemplateValue],
    ) -> Result<TemplateValue, minijinja::Error> {
        match method {
            "peek" => Ok(match self.xcom.peek(&self.task) {
                Some(value) => TemplateValue::from_serialize(&value),
                None => TemplateValue::from(""),
            }),
            "len" => Ok(TemplateValue::from(self.xcom.channel(&self.task).len())),
            other => Err(minijinja::Error::new(
                ErrorKind::UnknownMethod,
                format!("xcom channel has no method '{other}'"),
            )),
        }
    }
}
