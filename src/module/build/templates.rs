//! Generated build files.
//!
//! Dockerfile, nginx, and dockerignore templates written into a project
//! directory before its image is built. Next.js builds are multi-stage node
//! images that honor `BASE_PATH`; Vite/React builds compile the assets and
//! serve them from nginx on port 80.

use crate::module::registry::Framework;

/// Multi-stage dockerfile for the given framework.
pub fn dockerfile(framework: Framework) -> &'static str {
    match framework {
        Framework::Nextjs => NEXTJS_DOCKERFILE,
        Framework::Vite | Framework::React => VITE_DOCKERFILE,
    }
}

/// Default `.dockerignore` seeded into project directories so node build
/// artifacts never bloat the build context.
pub const DOCKERIGNORE: &str = "\
node_modules
.next
.git
.env*.local
npm-debug.log*
README.md
.dockerignore
Dockerfile
";

const NEXTJS_DOCKERFILE: &str = r#"FROM node:24-alpine3.21 AS deps
WORKDIR /app
COPY package.json package-lock.json* ./
RUN npm ci --only=production

FROM node:24-alpine3.21 AS builder
WORKDIR /app

ARG BASE_PATH
ENV BASE_PATH=${BASE_PATH}

COPY package.json package-lock.json* ./
RUN npm ci
COPY . .

RUN npm run build

FROM node:24-alpine3.21 AS runner
WORKDIR /app

ARG BASE_PATH
ENV BASE_PATH=${BASE_PATH}
ENV NODE_ENV=production
ENV HOSTNAME="0.0.0.0"

RUN addgroup --system --gid 1001 nodejs
RUN adduser --system --uid 1001 nextjs

COPY --from=builder /app/next.config.* ./
COPY --from=builder /app/public ./public
COPY --from=builder --chown=nextjs:nodejs /app/.next ./.next
COPY --from=builder /app/node_modules ./node_modules
COPY --from=builder /app/package.json ./package.json

USER nextjs
EXPOSE 3000
CMD ["npm", "start"]
"#;

const VITE_DOCKERFILE: &str = r#"FROM node:24-alpine3.21 AS builder
WORKDIR /app

ARG BASE_PATH
ENV BASE_PATH=${BASE_PATH}

COPY package.json package-lock.json* ./

RUN npm ci

COPY . .

RUN npm run build && \
    ls -la dist/ || (echo "ERROR: dist/ directory not found" && exit 1)

FROM nginx:alpine AS runner

COPY --from=builder /app/dist /usr/share/nginx/html

COPY nginx.conf /etc/nginx/conf.d/default.conf

EXPOSE 80
CMD ["nginx", "-g", "daemon off;"]
"#;

/// nginx site configuration for static frameworks: SPA fallback to
/// `index.html` and long-lived caching for fingerprinted assets.
pub const NGINX_CONF: &str = r#"server {
    listen 80;
    server_name localhost;

    root /usr/share/nginx/html;
    index index.html;

    location / {
        try_files $uri $uri/ /index.html;
    }

    location ~* \.(js|css|png|jpg|jpeg|gif|ico|svg|woff|woff2|ttf|eot)$ {
        expires 1y;
        add_header Cache-Control "public, immutable";
    }
}
"#;
