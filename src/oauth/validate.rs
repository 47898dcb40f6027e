//! Schema validation for inbound authorization and token requests.
//!
//! Raw input is a JSON object (form bodies and query strings are lifted into
//! one with every value a string). Each field is checked independently and
//! every failure is collected, so the caller gets the full list in field
//! declaration order rather than just the first problem.

use serde_json::{Map, Value};

/// Untyped request parameters.
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// Every field that failed validation, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse `application/x-www-form-urlencoded` data. The first occurrence of a
/// repeated key wins.
pub fn params_from_form(input: &[u8]) -> Result<Params, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(input)?;
    Ok(params_from_pairs(pairs))
}

pub fn params_from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Params {
    let mut params = Params::new();
    for (key, value) in pairs {
        params.entry(key).or_insert(Value::String(value));
    }
    params
}

/// Parse a JSON body. Anything but an object is an error.
pub fn params_from_json(input: &[u8]) -> Result<Params, serde_json::Error> {
    serde_json::from_slice(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeChallengeMethod {
    #[default]
    S256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: CodeChallengeMethod,
    pub client_secret: Option<String>,
    pub state: String,
    pub resource: Option<String>,
}

impl AuthorizationRequest {
    pub fn from_params(params: &Params) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(params);

        let client_id = fields.required_string("client_id");
        let redirect_uri = fields.required_url("redirect_uri");
        fields.literal("response_type", "code", true);
        let code_challenge = fields.optional_string("code_challenge");
        // defaults to S256 when absent
        fields.literal("code_challenge_method", "S256", false);
        let client_secret = fields.optional_string("client_secret");
        let state = fields.verbatim_string("state");
        let resource = fields.optional_url("resource");

        fields.finish()?;
        Ok(Self {
            client_id: client_id.unwrap_or_default(),
            redirect_uri: redirect_uri.unwrap_or_default(),
            code_challenge,
            code_challenge_method: CodeChallengeMethod::S256,
            client_secret,
            state: state.unwrap_or_default(),
            resource,
        })
    }
}

/// How the token request proves it holds the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof {
    CodeVerifier(String),
    ClientSecret(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub proof: Option<Proof>,
}

impl TokenRequest {
    pub fn from_params(params: &Params) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(params);

        fields.literal("grant_type", "authorization_code", true);
        let code = fields.required_string("code");
        let client_id = fields.required_string("client_id");
        let redirect_uri = fields.required_url("redirect_uri");
        let code_verifier = fields.optional_string("code_verifier");
        let client_secret = fields.optional_string("client_secret");

        let proof = match (code_verifier, client_secret) {
            (Some(_), Some(_)) => {
                fields.push(
                    "code_verifier",
                    "Provide either client_secret or code_verifier, not both",
                );
                None
            }
            (Some(verifier), None) => Some(Proof::CodeVerifier(verifier)),
            (None, Some(secret)) => Some(Proof::ClientSecret(secret)),
            (None, None) => None,
        };

        fields.finish()?;
        Ok(Self {
            code: code.unwrap_or_default(),
            client_id: client_id.unwrap_or_default(),
            redirect_uri: redirect_uri.unwrap_or_default(),
            proof,
        })
    }
}

/// Field-by-field reader that accumulates errors instead of failing fast.
struct Fields<'a> {
    params: &'a Params,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(params: &'a Params) -> Self {
        Self {
            params,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// `Ok(None)` for absent, null or empty values; form encoders send empty
    /// strings for unset fields.
    fn string(&mut self, name: &str) -> Result<Option<String>, ()> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => {
                self.push(
                    name,
                    format!("Expected string, received {}", type_name(other)),
                );
                Err(())
            }
        }
    }

    /// Required, with an empty string counted as a value rather than as absent.
    fn verbatim_string(&mut self, name: &str) -> Option<String> {
        match self.params.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => {
                self.push(name, "Required");
                None
            }
            Some(other) => {
                self.push(
                    name,
                    format!("Expected string, received {}", type_name(other)),
                );
                None
            }
        }
    }

    fn optional_string(&mut self, name: &str) -> Option<String> {
        self.string(name).ok().flatten()
    }

    fn required_string(&mut self, name: &str) -> Option<String> {
        match self.string(name) {
            Ok(Some(s)) => Some(s),
            Ok(None) => {
                self.push(name, "Required");
                None
            }
            Err(()) => None,
        }
    }

    fn required_url(&mut self, name: &str) -> Option<String> {
        let value = self.required_string(name)?;
        self.check_url(name, value)
    }

    fn optional_url(&mut self, name: &str) -> Option<String> {
        let value = self.optional_string(name)?;
        self.check_url(name, value)
    }

    fn check_url(&mut self, name: &str, value: String) -> Option<String> {
        match url::Url::parse(&value) {
            Ok(_) => Some(value),
            Err(_) => {
                self.push(name, "Invalid url");
                None
            }
        }
    }

    fn literal(&mut self, name: &str, expected: &str, required: bool) {
        let value = match self.string(name) {
            Ok(Some(value)) => value,
            Ok(None) if !required => return,
            Ok(None) => {
                self.push(name, "Required");
                return;
            }
            Err(()) => return,
        };
        if value != expected {
            self.push(
                name,
                format!("Invalid literal value, expected \"{expected}\""),
            );
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
