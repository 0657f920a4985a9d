use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::{DuelError, Result};

/// Judge0 language ids for the languages players can pick in the editor
const LANGUAGES: &[(&str, u32)] = &[
    ("javascript", 63),
    ("python", 71),
    ("java", 62),
    ("cpp", 54),
    ("c", 50),
];

/// Resolve a language name to its Judge0 language id
pub fn language_id(language: &str) -> Result<u32> {
    LANGUAGES
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, id)| *id)
        .ok_or_else(|| DuelError::UnsupportedLanguage(language.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub statement: String,
    /// Name the harness calls; players implement a function with this name
    pub function_name: String,
    pub tests: Vec<TestCase>,
    /// Per-language harness templates with {{user_code}} / {{function_name}}
    /// markers. A missing entry means the problem cannot be graded in that
    /// language.
    pub templates: HashMap<String, String>,
}

impl Problem {
    /// The illustrative cases used for Run (the full set is gated behind Submit)
    pub fn sample_tests(&self) -> &[TestCase] {
        &self.tests[..self.tests.len().min(3)]
    }
}

pub struct ProblemCatalog {
    problems: Vec<Problem>,
}

impl ProblemCatalog {
    /// The built-in problem set
    pub fn builtin() -> Self {
        Self {
            problems: builtin_problems(),
        }
    }

    pub fn get(&self, id: &str) -> Result<&Problem> {
        self.problems
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| DuelError::ProblemNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Pick a problem set for a new room. "mixed" draws from the whole
    /// catalog, anything else filters by difficulty first.
    pub fn sample(&self, difficulty: &str, count: usize) -> Vec<String> {
        let mut candidates: Vec<&Problem> = self
            .problems
            .iter()
            .filter(|p| difficulty == "mixed" || p.difficulty == difficulty)
            .collect();

        if candidates.is_empty() {
            candidates = self.problems.iter().collect();
        }

        let mut rng = rand::thread_rng();
        candidates.shuffle(&mut rng);
        candidates
            .into_iter()
            .take(count)
            .map(|p| p.id.clone())
            .collect()
    }
}

fn tc(input: &str, expected: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected: expected.to_string(),
    }
}

/// Harness for problems taking a JSON value on line one and, optionally,
/// an integer on line two.
const PY_JSON_HARNESS: &str = r#"import sys, json

{{user_code}}

if __name__ == "__main__":
    _lines = sys.stdin.read().splitlines()
    _args = [json.loads(l) for l in _lines if l.strip()]
    _result = {{function_name}}(*_args)
    print(json.dumps(_result, separators=(",", ":")))
"#;

const JS_JSON_HARNESS: &str = r#"const _lines = require("fs").readFileSync(0, "utf8").split("\n");

{{user_code}}

const _args = _lines.filter((l) => l.trim().length > 0).map((l) => JSON.parse(l));
console.log(JSON.stringify({{function_name}}(..._args)));
"#;

/// Variant for boolean-returning problems where the expected output is a
/// bare true/false token rather than JSON.
const PY_BOOL_HARNESS: &str = r#"import sys, json

{{user_code}}

if __name__ == "__main__":
    _lines = sys.stdin.read().splitlines()
    _args = [json.loads(l) for l in _lines if l.strip()]
    print("true" if {{function_name}}(*_args) else "false")
"#;

const JS_BOOL_HARNESS: &str = r#"const _lines = require("fs").readFileSync(0, "utf8").split("\n");

{{user_code}}

const _args = _lines.filter((l) => l.trim().length > 0).map((l) => JSON.parse(l));
console.log({{function_name}}(..._args) ? "true" : "false");
"#;

fn json_templates() -> HashMap<String, String> {
    HashMap::from([
        ("python".to_string(), PY_JSON_HARNESS.to_string()),
        ("javascript".to_string(), JS_JSON_HARNESS.to_string()),
    ])
}

fn bool_templates() -> HashMap<String, String> {
    HashMap::from([
        ("python".to_string(), PY_BOOL_HARNESS.to_string()),
        ("javascript".to_string(), JS_BOOL_HARNESS.to_string()),
    ])
}

fn builtin_problems() -> Vec<Problem> {
    vec![
        Problem {
            id: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            difficulty: "easy".to_string(),
            tags: vec!["array".to_string(), "hash-map".to_string()],
            statement: "Given an array of integers 'nums' and an integer 'target', \
                        return the indices of the two numbers that add up to 'target'. \
                        Exactly one solution exists and an element may not be used twice."
                .to_string(),
            function_name: "twoSum".to_string(),
            tests: vec![
                tc("[2,7,11,15]\n9", "[0,1]"),
                tc("[3,2,4]\n6", "[1,2]"),
                tc("[3,3]\n6", "[0,1]"),
                tc("[-1,-2,-3,-4,-5]\n-8", "[2,4]"),
                tc("[0,4,3,0]\n0", "[0,3]"),
            ],
            templates: json_templates(),
        },
        Problem {
            id: "reverse-string".to_string(),
            title: "Reverse String".to_string(),
            difficulty: "easy".to_string(),
            tags: vec!["string".to_string(), "two-pointers".to_string()],
            statement: "Write a function that reverses a string given as an array of \
                        characters 's' and returns the reversed array."
                .to_string(),
            function_name: "reverseString".to_string(),
            tests: vec![
                tc("[\"h\",\"e\",\"l\",\"l\",\"o\"]", "[\"o\",\"l\",\"l\",\"e\",\"h\"]"),
                tc(
                    "[\"H\",\"a\",\"n\",\"n\",\"a\",\"h\"]",
                    "[\"h\",\"a\",\"n\",\"n\",\"a\",\"H\"]",
                ),
                tc("[\"a\"]", "[\"a\"]"),
                tc("[\"a\",\"b\"]", "[\"b\",\"a\"]"),
                tc("[\"A\",\" \",\"m\"]", "[\"m\",\" \",\"A\"]"),
            ],
            templates: json_templates(),
        },
        Problem {
            id: "valid-parentheses".to_string(),
            title: "Valid Parentheses".to_string(),
            difficulty: "easy".to_string(),
            tags: vec!["string".to_string(), "stack".to_string()],
            statement: "Given a string 's' containing just the characters '(', ')', '{', \
                        '}', '[' and ']', determine if the input string is valid: open \
                        brackets are closed by the same type in the correct order."
                .to_string(),
            function_name: "isValid".to_string(),
            tests: vec![
                tc("\"()\"", "true"),
                tc("\"()[]{}\"", "true"),
                tc("\"(]\"", "false"),
                tc("\"([)]\"", "false"),
                tc("\"{[]}\"", "true"),
                tc("\"[\"", "false"),
                tc("\")\"", "false"),
                tc("\"(([\"", "false"),
            ],
            templates: bool_templates(),
        },
        Problem {
            id: "longest-substring".to_string(),
            title: "Longest Substring Without Repeating Characters".to_string(),
            difficulty: "medium".to_string(),
            tags: vec!["string".to_string(), "sliding-window".to_string()],
            statement: "Given a string 's', find the length of the longest substring \
                        without duplicate characters."
                .to_string(),
            function_name: "lengthOfLongestSubstring".to_string(),
            tests: vec![
                tc("\"abcabcbb\"", "3"),
                tc("\"bbbbb\"", "1"),
                tc("\"pwwkew\"", "3"),
                tc("\"\"", "0"),
                tc("\"dvdf\"", "3"),
                tc("\"abba\"", "2"),
            ],
            templates: json_templates(),
        },
        Problem {
            id: "product-except-self".to_string(),
            title: "Product of Array Except Self".to_string(),
            difficulty: "medium".to_string(),
            tags: vec!["array".to_string(), "prefix-sum".to_string()],
            statement: "Given an integer array 'nums', return an array 'answer' such \
                        that answer[i] is the product of all elements of nums except \
                        nums[i], without using division."
                .to_string(),
            function_name: "productExceptSelf".to_string(),
            tests: vec![
                tc("[1,2,3,4]", "[24,12,8,6]"),
                tc("[-1,1,0,-3,3]", "[0,0,9,0,0]"),
                tc("[2,2]", "[2,2]"),
                tc("[5]", "[1]"),
            ],
            templates: json_templates(),
        },
        Problem {
            id: "merge-intervals".to_string(),
            title: "Merge Intervals".to_string(),
            difficulty: "medium".to_string(),
            tags: vec!["array".to_string(), "sorting".to_string()],
            statement: "Given an array of intervals, merge all overlapping intervals \
                        and return an array of the non-overlapping intervals that \
                        cover all the intervals in the input."
                .to_string(),
            function_name: "mergeIntervals".to_string(),
            tests: vec![
                tc("[[1,3],[2,6],[8,10],[15,18]]", "[[1,6],[8,10],[15,18]]"),
                tc("[[1,4],[4,5]]", "[[1,5]]"),
                tc("[[1,4],[2,3]]", "[[1,4]]"),
                tc("[[5,6]]", "[[5,6]]"),
            ],
            templates: json_templates(),
        },
    ]
}
