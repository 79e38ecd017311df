use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use thiserror::Error;

use super::{ToolError, ToolResult, ToolService, optional_str};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const WEATHER_CONDITIONS: [&str; 5] = ["Sunny", "Partly Cloudy", "Cloudy", "Light Rain", "Clear"];

pub(super) fn register_all(service: &mut ToolService) {
    service.register_function(
        "GetCurrentTime",
        "Get the current date and time in a specific timezone",
        json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "The timezone (e.g., 'UTC', 'PST', 'JST'). Default is UTC."
                }
            },
            "required": []
        }),
        get_current_time,
    );

    service.register_function(
        "GetWeather",
        "Get the current weather for a location",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city and state/country, e.g., 'San Francisco, CA' or 'Tokyo, Japan'"
                },
                "unit": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "description": "The temperature unit to use"
                }
            },
            "required": ["location"]
        }),
        get_weather,
    );

    service.register_function(
        "CalculateExpression",
        "Evaluate a mathematical expression",
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate (e.g., '2 + 2')"
                }
            },
            "required": ["expression"]
        }),
        calculate_expression,
    );
}

fn get_current_time(args: &Value) -> ToolResult {
    current_time_at(args, Utc::now())
}

fn current_time_at(args: &Value, now: DateTime<Utc>) -> ToolResult {
    let timezone = optional_str(args, "timezone")?.unwrap_or("UTC");
    let formatted = match resolve_timezone(timezone) {
        Some(tz) => now.with_timezone(&tz).format(TIME_FORMAT).to_string(),
        None => now.format(TIME_FORMAT).to_string(),
    };
    Ok(format!("Current time in {timezone}: {formatted}"))
}

/// Unknown aliases resolve to `None`, which means UTC.
fn resolve_timezone(alias: &str) -> Option<Tz> {
    match alias.trim().to_ascii_uppercase().as_str() {
        "PST" | "PT" => Some(chrono_tz::America::Los_Angeles),
        "EST" | "ET" => Some(chrono_tz::America::New_York),
        "JST" => Some(chrono_tz::Asia::Tokyo),
        _ => None,
    }
}

/// Mock weather: the same location always yields the same reading.
fn get_weather(args: &Value) -> ToolResult {
    if args.get("location").is_none() {
        return Err(ToolError::MissingArgument("Location"));
    }
    let location = optional_str(args, "location")?.unwrap_or("Unknown");
    let unit = optional_str(args, "unit")?.unwrap_or("celsius");

    let mut rng = StdRng::seed_from_u64(location_seed(location));
    let celsius: i32 = rng.random_range(15..30);
    let condition = WEATHER_CONDITIONS[rng.random_range(0..WEATHER_CONDITIONS.len())];

    let (temperature, symbol) = if unit == "fahrenheit" {
        (celsius_to_fahrenheit(celsius), "°F")
    } else {
        (celsius, "°C")
    };
    Ok(format!(
        "Weather in {location}: {condition}, {temperature}{symbol}"
    ))
}

fn location_seed(location: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    location.hash(&mut hasher);
    hasher.finish()
}

fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    (f64::from(celsius) * 9.0 / 5.0 + 32.0).round() as i32
}

fn calculate_expression(args: &Value) -> ToolResult {
    if args.get("expression").is_none() {
        return Err(ToolError::MissingArgument("Expression"));
    }
    let expression = optional_str(args, "expression")?.unwrap_or("");

    evaluate_simple_expression(expression)
        .map(|result| format!("Result: {result}"))
        .map_err(|err| ToolError::Evaluation(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum EvalError {
    #[error("Cannot divide by zero")]
    DivideByZero,

    #[error("Unable to evaluate expression: {0}")]
    Unsupported(String),
}

/// Handles a bare number or exactly one `+ - * /` between two numbers.
/// No precedence, parentheses, or chaining.
fn evaluate_simple_expression(expression: &str) -> Result<f64, EvalError> {
    let expression = expression.replace(' ', "");

    if let Ok(value) = expression.parse::<f64>() {
        return Ok(value);
    }

    for op in ['+', '-', '*', '/'] {
        if !expression.contains(op) || (op == '-' && expression.starts_with('-')) {
            continue;
        }

        let parts: Vec<&str> = expression.split(op).collect();
        let [left, right] = parts.as_slice() else {
            continue;
        };
        let (Ok(left), Ok(right)) = (left.parse::<f64>(), right.parse::<f64>()) else {
            continue;
        };

        return match op {
            '+' => Ok(left + right),
            '-' => Ok(left - right),
            '*' => Ok(left * right),
            _ if right == 0.0 => Err(EvalError::DivideByZero),
            _ => Ok(left / right),
        };
    }

    Err(EvalError::Unsupported(expression))
}
