//! Import path rewriting for copied code
//!
//! Every generated file sits one directory below the package root, so the
//! host app's `@/` aliases map onto fixed `../` paths. This is plain string
//! substitution on quoted specifiers, not module resolution.

/// Alias prefix and its package-relative replacement
const ALIASES: &[(&str, &str)] = &[
    ("@/components/", "../components/"),
    ("@/hooks/", "../hooks/"),
    ("@/services/", "../services/"),
    ("@/lib/", "../lib/"),
    ("@/utils/", "../lib/"),
    ("@/types/", "../types/"),
    ("@/types", "../types"),
];

/// Rewrite aliased import specifiers in `code`
pub fn rewrite_imports(code: &str) -> String {
    let mut rewritten = code.to_string();
    for (alias, relative) in ALIASES {
        for quote in ['\'', '"'] {
            rewritten = rewritten.replace(
                &format!("{}{}", quote, alias),
                &format!("{}{}", quote, relative),
            );
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_quoted_aliases() {
        let code = r#"import { Button } from '@/components/Button';
import { cn } from "@/lib/utils";
import type { Contact } from '@/types';
import { formatDate } from '@/utils/format';
const note = "see @/components/ for more";"#;

        let rewritten = rewrite_imports(code);
        assert!(rewritten.contains("from '../components/Button'"));
        assert!(rewritten.contains(r#"from "../lib/utils""#));
        assert!(rewritten.contains("from '../types'"));
        assert!(rewritten.contains("from '../lib/format'"));
        assert!(rewritten.contains("see @/components/ for more"));
    }

    #[test]
    fn test_leaves_packages_alone() {
        let code = "import React from 'react';";
        assert_eq!(rewrite_imports(code), code);
    }
}
